use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, Endianness};

use super::ParseError;

pub trait PacketComponent {
    fn write<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
    ) -> Result<(), ParseError>;
    fn read<E: Endianness>(&mut self, reader: &mut BitReader<&[u8], E>) -> Result<(), ParseError>;

    /// Read with access to the full packet buffer for compression support
    fn read_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        _packet_buf: &[u8],
    ) -> Result<(), ParseError> {
        // Default implementation just calls read for backwards compatibility
        self.read(reader)
    }

    fn read_labels<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
    ) -> Result<Vec<String>, ParseError> {
        // Default implementation without compression support
        // Override this method in implementations that need compression
        self.read_labels_with_buffer(reader, None)
    }

    fn read_labels_with_buffer<E: Endianness>(
        &mut self,
        reader: &mut BitReader<&[u8], E>,
        packet_buf: Option<&[u8]>,
    ) -> Result<Vec<String>, ParseError> {
        if let Some(buf) = packet_buf {
            let mut labels = Vec::new();
            let mut jump_count = 0;

            loop {
                let first_byte = reader.read_var::<u8>(8)?;

                if first_byte == 0 {
                    break;
                }

                if (first_byte & 0xC0) == 0xC0 {
                    // This is a compression pointer
                    let second_byte = reader.read_var::<u8>(8)?;
                    let pointer = ((first_byte as u16 & 0x3F) << 8) | second_byte as u16;

                    let (pointer_labels, _) = decode_name_at(buf, pointer as usize)?;
                    labels.extend(pointer_labels);
                    break;
                }

                if first_byte > 63 {
                    return Err(ParseError::InvalidLabel);
                }

                let mut label_buf = vec![0; first_byte as usize];
                reader.read_bytes(&mut label_buf)?;
                let label = String::from_utf8(label_buf).map_err(|_| ParseError::InvalidLabel)?;
                labels.push(label);

                jump_count += 1;
                if jump_count > 100 {
                    return Err(ParseError::InvalidLabel);
                }
            }

            Ok(labels)
        } else {
            // Fallback to simple parsing without compression support
            let mut labels = Vec::new();

            loop {
                let first_byte = reader.read_var::<u8>(8)?;

                if first_byte == 0 {
                    break;
                }

                if (first_byte & 0xC0) == 0xC0 {
                    // Compression pointer without buffer - can't follow
                    return Err(ParseError::InvalidLabel);
                }

                if first_byte > 63 {
                    return Err(ParseError::InvalidLabel);
                }

                let mut buf = vec![0; first_byte as usize];
                reader.read_bytes(&mut buf)?;
                let label = String::from_utf8(buf).map_err(|_| ParseError::InvalidLabel)?;
                labels.push(label);
            }

            Ok(labels)
        }
    }

    fn write_labels<E: Endianness>(
        &self,
        writer: &mut BitWriter<&mut Vec<u8>, E>,
        labels: &Vec<String>,
    ) -> Result<(), ParseError> {
        // Handle root zone (empty labels)
        if labels.is_empty() {
            writer.write_var::<u8>(8, 0)?;
            return Ok(());
        }

        for label in labels {
            if label.is_empty() {
                // Write null terminator for root label
                writer.write_var::<u8>(8, 0)?;
                break;
            } else {
                writer.write_var::<u8>(8, label.len() as u8)?;
                writer.write_bytes(label.as_bytes())?;
            }
        }

        // Ensure we always write a null terminator if not already written
        if !labels.last().unwrap().is_empty() {
            writer.write_var::<u8>(8, 0)?;
        }

        Ok(())
    }
}

/// Decode a sequence of labels starting at `offset` in the full packet
/// buffer, following compression pointers (RFC 1035 §4.1.4).
///
/// Returns the decoded labels and the number of bytes occupied by the
/// name *at `offset`* — i.e. the wire-format advance the caller's own
/// cursor should make, which stops at a pointer's second byte rather
/// than following it. Used by the manual cursor-based parsing in
/// `packet.rs`/`resource.rs`, and by [`PacketComponent::read_labels_with_buffer`]
/// for pointer targets it jumps to.
pub fn decode_name_at(buf: &[u8], offset: usize) -> Result<(Vec<String>, usize), ParseError> {
    let mut labels = Vec::new();
    let mut pos = offset;
    let mut cursor_end = None;
    let mut jumps = 0;

    loop {
        let first_byte = *buf.get(pos).ok_or(ParseError::UnexpectedEof)?;

        if first_byte == 0 {
            if cursor_end.is_none() {
                cursor_end = Some(pos + 1);
            }
            break;
        }

        if (first_byte & 0xC0) == 0xC0 {
            let second_byte = *buf.get(pos + 1).ok_or(ParseError::UnexpectedEof)?;
            let pointer = ((first_byte as u16 & 0x3F) << 8) | second_byte as u16;

            if cursor_end.is_none() {
                cursor_end = Some(pos + 2);
            }

            jumps += 1;
            if jumps > 100 {
                return Err(ParseError::InvalidLabel);
            }

            pos = pointer as usize;
            continue;
        }

        if first_byte > 63 {
            return Err(ParseError::InvalidLabel);
        }

        let start = pos + 1;
        let end = start + first_byte as usize;
        let label_bytes = buf.get(start..end).ok_or(ParseError::UnexpectedEof)?;
        let label = std::str::from_utf8(label_bytes)
            .map_err(|_| ParseError::InvalidLabel)?
            .to_string();
        labels.push(label);

        pos = end;

        jumps += 1;
        if jumps > 100 {
            return Err(ParseError::InvalidLabel);
        }
    }

    Ok((labels, cursor_end.unwrap_or(pos) - offset))
}

/// Big-endian byte-cursor primitives used by the manual record parser.
/// Kept alongside `decode_name_at` since both operate directly on the raw
/// packet buffer rather than through a `BitReader`.
pub fn read_u8(buf: &[u8], offset: &mut usize) -> Result<u8, ParseError> {
    let b = *buf.get(*offset).ok_or(ParseError::UnexpectedEof)?;
    *offset += 1;
    Ok(b)
}

pub fn read_u16(buf: &[u8], offset: &mut usize) -> Result<u16, ParseError> {
    let hi = read_u8(buf, offset)? as u16;
    let lo = read_u8(buf, offset)? as u16;
    Ok((hi << 8) | lo)
}

pub fn read_u32(buf: &[u8], offset: &mut usize) -> Result<u32, ParseError> {
    let hi = read_u16(buf, offset)? as u32;
    let lo = read_u16(buf, offset)? as u32;
    Ok((hi << 16) | lo)
}

pub fn read_bytes<'a>(buf: &'a [u8], offset: &mut usize, len: usize) -> Result<&'a [u8], ParseError> {
    let slice = buf
        .get(*offset..*offset + len)
        .ok_or(ParseError::UnexpectedEof)?;
    *offset += len;
    Ok(slice)
}

/// Read an uncompressed, null-terminated label sequence starting at
/// `offset` inside `buf` (which may itself be a slice local to an rdata
/// region). Errors on a compression pointer — used for fields such as
/// RRSIG's signer name, which RFC 4034 §6.2 requires to be uncompressed.
pub fn read_name_uncompressed(buf: &[u8], offset: &mut usize) -> Result<Vec<String>, ParseError> {
    let mut labels = Vec::new();
    loop {
        let len = read_u8(buf, offset)?;
        if len == 0 {
            break;
        }
        if (len & 0xC0) == 0xC0 {
            return Err(ParseError::InvalidLabel);
        }
        if len > 63 {
            return Err(ParseError::InvalidLabel);
        }
        let label_bytes = read_bytes(buf, offset, len as usize)?;
        let label = std::str::from_utf8(label_bytes)
            .map_err(|_| ParseError::InvalidLabel)?
            .to_string();
        labels.push(label);
    }
    Ok(labels)
}

/// Encode a label sequence with no compression (RFC 1035 §4.1.4 is
/// optional on the wire; outgoing messages from this resolver never
/// compress, matching most stub/forwarding resolvers' encoder behavior).
pub fn write_name_uncompressed(out: &mut Vec<u8>, labels: &[String]) {
    for label in labels {
        if label.is_empty() {
            continue;
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}
