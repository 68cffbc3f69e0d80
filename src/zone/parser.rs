use super::{Result, Zone, ZoneError, ZoneRecord, constants};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// RFC 1035 zone file parser
pub struct ZoneParser {
    /// Current origin for relative names
    current_origin: String,
    /// Current default TTL
    current_ttl: Option<u32>,
    /// Current class
    current_class: DNSResourceClass,
    /// Line number for error reporting
    line_number: usize,
}

impl ZoneParser {
    /// Create a new zone parser
    pub fn new() -> Self {
        Self {
            current_origin: String::new(),
            current_ttl: None,
            current_class: DNSResourceClass::IN,
            line_number: 0,
        }
    }

    /// Parse a zone file from path
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Zone> {
        let path = path.as_ref();

        // Read file contents
        let contents = fs::read_to_string(path).map_err(|e| ZoneError::IoError(e.to_string()))?;

        // Check file size
        if contents.len() > constants::MAX_ZONE_FILE_SIZE {
            return Err(ZoneError::FileTooLarge);
        }

        // Parse contents
        let mut zone = self.parse(&contents)?;
        zone.file_path = Some(path.to_string_lossy().to_string());

        Ok(zone)
    }

    /// Parse zone file contents
    pub fn parse(&mut self, contents: &str) -> Result<Zone> {
        self.line_number = 0;

        // Create zone (origin will be set by $ORIGIN or first SOA)
        let mut zone = Zone::new(String::new(), constants::DEFAULT_TTL);
        let mut _found_origin = false;
        let mut pending_records = Vec::new();

        // Buffer for multi-line records
        let mut multi_line_buffer = String::new();
        let mut in_parentheses = false;
        let mut paren_start_line = 0;

        // Process lines
        for line in contents.lines() {
            self.line_number += 1;

            // Skip empty lines and comments (unless in multi-line)
            let line = self.strip_comments(line);
            if line.trim().is_empty() && !in_parentheses {
                continue;
            }

            trace!("Parsing line {}: {}", self.line_number, line);

            // Handle multi-line records with parentheses
            if in_parentheses {
                multi_line_buffer.push(' ');
                multi_line_buffer.push_str(line.trim());

                // Check if we're closing the parentheses
                if line.contains(')') && !line.contains('(') {
                    in_parentheses = false;
                    let complete_line = multi_line_buffer.clone();
                    multi_line_buffer.clear();

                    // Process the complete multi-line record
                    match self.parse_record(&complete_line) {
                        Ok(record) => {
                            pending_records.push(record);
                        }
                        Err(e) => {
                            return Err(ZoneError::ParseError(format!(
                                "Lines {}-{}: {}",
                                paren_start_line, self.line_number, e
                            )));
                        }
                    }
                }
                continue;
            }

            // Check if we're starting a multi-line record
            if line.contains('(') && !line.contains(')') {
                in_parentheses = true;
                paren_start_line = self.line_number;
                multi_line_buffer = line.to_string();
                continue;
            }

            // Handle directives
            if line.trim_start().starts_with('$') {
                self.parse_directive(line, &mut zone, &mut pending_records)?;
                if line.trim_start().starts_with("$ORIGIN") {
                    _found_origin = true;
                }
                continue;
            }

            // Parse single-line resource record
            match self.parse_record(line) {
                Ok(record) => {
                    pending_records.push(record);
                }
                Err(e) => {
                    return Err(ZoneError::ParseError(format!(
                        "Line {}: {}",
                        self.line_number, e
                    )));
                }
            }
        }

        // Check for unclosed parentheses
        if in_parentheses {
            return Err(ZoneError::ParseError(format!(
                "Unclosed parentheses starting at line {}",
                paren_start_line
            )));
        }

        // Validate zone has origin
        if zone.origin.is_empty() {
            return Err(ZoneError::ParseError(
                "Zone file missing $ORIGIN directive or SOA record".to_string(),
            ));
        }

        // Apply default TTL if set
        if let Some(ttl) = self.current_ttl {
            zone.default_ttl = ttl;
        }

        // Now add all pending records
        for record in pending_records {
            zone.add_record(record)?;
        }

        // Validate zone
        zone.validate()?;

        debug!(
            "Parsed zone {} with {} records",
            zone.origin,
            zone.stats().total_records
        );

        Ok(zone)
    }

    /// Strip comments from a line
    fn strip_comments<'a>(&self, line: &'a str) -> &'a str {
        if let Some(pos) = line.find(';') {
            &line[..pos]
        } else {
            line
        }
    }

    /// Parse a directive line
    fn parse_directive(
        &mut self,
        line: &str,
        zone: &mut Zone,
        pending_records: &mut Vec<ZoneRecord>,
    ) -> Result<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(());
        }

        match parts[0].to_uppercase().as_str() {
            "$ORIGIN" => {
                if parts.len() < 2 {
                    return Err(ZoneError::ParseError(
                        "$ORIGIN requires domain name".to_string(),
                    ));
                }
                let origin = parts[1].trim_end_matches('.').to_lowercase();
                self.current_origin = origin.clone();
                zone.origin = origin.clone();
                debug!("Set origin to: {}", origin);
            }
            "$TTL" => {
                if parts.len() < 2 {
                    return Err(ZoneError::ParseError("$TTL requires value".to_string()));
                }
                let ttl = self.parse_ttl(parts[1])?;
                self.current_ttl = Some(ttl);
                zone.default_ttl = ttl;
                debug!("Set default TTL to: {}", ttl);
            }
            "$INCLUDE" => {
                if parts.len() < 2 {
                    return Err(ZoneError::ParseError(
                        "$INCLUDE requires file path".to_string(),
                    ));
                }

                let include_path = parts[1];
                let domain = if parts.len() > 2 {
                    Some(parts[2].trim_end_matches('.').to_lowercase())
                } else {
                    None
                };

                debug!("Processing $INCLUDE {} {:?}", include_path, domain);

                // Save current state
                let saved_origin = self.current_origin.clone();
                let saved_line = self.line_number;

                // Set origin for included file if specified
                if let Some(ref domain) = domain {
                    self.current_origin = domain.clone();
                }

                // Read and parse the included file's content
                let include_contents = fs::read_to_string(include_path).map_err(|e| {
                    ZoneError::ParseError(format!(
                        "Failed to read include file {}: {}",
                        include_path, e
                    ))
                })?;

                // Parse the included content into records
                // We need to parse line by line to avoid zone validation issues
                let included_lines = include_contents.lines();
                let saved_line_number = self.line_number;
                self.line_number = 0;

                for line in included_lines {
                    self.line_number += 1;

                    // Skip empty lines and comments
                    let line = self.strip_comments(line);
                    if line.trim().is_empty() {
                        continue;
                    }

                    // Skip directives in included files (except nested $INCLUDE)
                    if line.trim_start().starts_with('$') {
                        if line.trim_start().starts_with("$INCLUDE") {
                            // Handle nested includes
                            self.parse_directive(line, zone, pending_records)?;
                        }
                        // Skip other directives like $ORIGIN, $TTL
                        continue;
                    }

                    // Parse the record
                    match self.parse_record(line) {
                        Ok(mut record) => {
                            // Adjust record name if a different origin was specified
                            if domain.is_some() {
                                if record.name == "@" || record.name.is_empty() {
                                    // @ or empty name becomes the include origin
                                    record.name = self.current_origin.clone();
                                } else if !record.name.contains('.') {
                                    // Relative names are prefixed with the include origin
                                    record.name =
                                        format!("{}.{}", record.name, self.current_origin);
                                }
                                // Fully qualified names remain unchanged
                            }
                            pending_records.push(record);
                        }
                        Err(e) => {
                            return Err(ZoneError::ParseError(format!(
                                "Error in included file {} line {}: {}",
                                include_path, self.line_number, e
                            )));
                        }
                    }
                }

                self.line_number = saved_line_number;
                debug!("Successfully processed $INCLUDE {}", include_path);

                // Restore state
                self.current_origin = saved_origin;
                self.line_number = saved_line;
            }
            "$GENERATE" => {
                if parts.len() < 4 {
                    return Err(ZoneError::ParseError(
                        "$GENERATE requires range, lhs, type, and rhs".to_string(),
                    ));
                }

                let range_str = parts[1];
                let lhs = parts[2];
                let rtype_str = parts[3];
                let rhs = parts[4..].join(" ");

                // Parse range (e.g., "1-10", "20-30/2" for step)
                let (start, stop, step) = self.parse_generate_range(range_str)?;

                // Parse record type
                let rtype = self.parse_type(rtype_str)?;

                debug!(
                    "Processing $GENERATE {}-{}/{} {} {} {}",
                    start, stop, step, lhs, rtype_str, rhs
                );

                // Generate records
                let mut i = start;
                while i <= stop {
                    // First expand format specifiers, then replace simple $
                    let name = self.expand_generate_format(lhs, i)?;
                    let rdata = self.expand_generate_format(&rhs, i)?;

                    // Replace remaining $ with the current value
                    let name = name.replace('$', &i.to_string());
                    let rdata = rdata.replace('$', &i.to_string());

                    // Create the record
                    let record =
                        ZoneRecord::new(name, self.current_ttl, self.current_class, rtype, rdata);

                    pending_records.push(record);
                    i += step;
                }

                debug!(
                    "Generated {} records from $GENERATE",
                    (stop - start) / step + 1
                );
            }
            _ => {
                debug!("Unknown directive: {}", parts[0]);
            }
        }

        Ok(())
    }

    /// Parse a resource record line
    fn parse_record(&self, line: &str) -> Result<ZoneRecord> {
        let mut parts = Vec::new();
        let mut in_quotes = false;
        let mut in_parens = false;
        let mut current_part = String::new();

        // Parse line respecting quoted strings and parentheses
        for ch in line.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current_part.push(ch);
                }
                '(' => {
                    in_parens = true;
                    // Don't include the parenthesis in the part
                }
                ')' => {
                    in_parens = false;
                    // Don't include the parenthesis in the part
                }
                ' ' | '\t' => {
                    if in_quotes || in_parens {
                        current_part.push(ch);
                    } else if !current_part.is_empty() {
                        parts.push(current_part.clone());
                        current_part.clear();
                    }
                }
                _ => {
                    current_part.push(ch);
                }
            }
        }

        if !current_part.is_empty() {
            parts.push(current_part);
        }

        if parts.is_empty() {
            return Err(ZoneError::ParseError("Empty record line".to_string()));
        }

        // Parse record components
        let mut idx = 0;
        let name;
        let mut ttl = self.current_ttl;
        let mut class = self.current_class;
        let mut rtype = None;

        // First field could be name, TTL, class, or type
        // If it starts with whitespace, name is inherited from previous record
        if line.starts_with(' ') || line.starts_with('\t') {
            // Name is empty (inherit from previous)
            name = String::new();
        } else {
            // First field is the name
            name = parts[idx].clone();
            idx += 1;
        }

        // Parse optional TTL, class, and type
        while idx < parts.len() && rtype.is_none() {
            let field = &parts[idx];

            // Try to parse as TTL
            if let Ok(ttl_value) = self.parse_ttl(field) {
                ttl = Some(ttl_value);
                idx += 1;
                continue;
            }

            // Try to parse as class
            if let Ok(parsed_class) = self.parse_class(field) {
                class = parsed_class;
                idx += 1;
                continue;
            }

            // Try to parse as type
            if let Ok(parsed_type) = self.parse_type(field) {
                rtype = Some(parsed_type);
                idx += 1;
                break;
            }

            return Err(ZoneError::ParseError(format!("Invalid field: {}", field)));
        }

        // Type is required
        let rtype =
            rtype.ok_or_else(|| ZoneError::ParseError("Missing record type".to_string()))?;

        // Rest is RDATA
        if idx >= parts.len() {
            return Err(ZoneError::ParseError("Missing RDATA".to_string()));
        }

        let rdata = parts[idx..].join(" ").trim_matches('"').to_string();

        Ok(ZoneRecord::new(name, ttl, class, rtype, rdata))
    }

    /// Parse TTL value (supports suffixes like 1h, 30m, etc.)
    fn parse_ttl(&self, s: &str) -> Result<u32> {
        let s = s.to_lowercase();

        // Check for time suffixes
        if let Some(num_str) = s.strip_suffix('s') {
            // Seconds
            num_str
                .parse()
                .map_err(|_| ZoneError::InvalidTTL(s.to_string()))
        } else if let Some(num_str) = s.strip_suffix('m') {
            // Minutes
            num_str
                .parse::<u32>()
                .map(|n| n * 60)
                .map_err(|_| ZoneError::InvalidTTL(s.to_string()))
        } else if let Some(num_str) = s.strip_suffix('h') {
            // Hours
            num_str
                .parse::<u32>()
                .map(|n| n * 3600)
                .map_err(|_| ZoneError::InvalidTTL(s.to_string()))
        } else if let Some(num_str) = s.strip_suffix('d') {
            // Days
            num_str
                .parse::<u32>()
                .map(|n| n * 86400)
                .map_err(|_| ZoneError::InvalidTTL(s.to_string()))
        } else if let Some(num_str) = s.strip_suffix('w') {
            // Weeks
            num_str
                .parse::<u32>()
                .map(|n| n * 604800)
                .map_err(|_| ZoneError::InvalidTTL(s.to_string()))
        } else {
            // No suffix, assume seconds
            s.parse().map_err(|_| ZoneError::InvalidTTL(s.to_string()))
        }
    }

    /// Parse class
    fn parse_class(&self, s: &str) -> Result<DNSResourceClass> {
        match s.to_uppercase().as_str() {
            "IN" => Ok(DNSResourceClass::IN),
            "CS" => Ok(DNSResourceClass::CS),
            "CH" => Ok(DNSResourceClass::CH),
            "HS" => Ok(DNSResourceClass::HS),
            _ => Err(ZoneError::ParseError(format!("Unknown class: {}", s))),
        }
    }

    /// Parse record type
    fn parse_type(&self, s: &str) -> Result<DNSResourceType> {
        match s.to_uppercase().as_str() {
            "A" => Ok(DNSResourceType::A),
            "NS" => Ok(DNSResourceType::NS),
            "CNAME" => Ok(DNSResourceType::CNAME),
            "SOA" => Ok(DNSResourceType::SOA),
            "PTR" => Ok(DNSResourceType::PTR),
            "MX" => Ok(DNSResourceType::MX),
            "TXT" => Ok(DNSResourceType::TXT),
            "AAAA" => Ok(DNSResourceType::AAAA),
            "SRV" => Ok(DNSResourceType::SRV),
            "CAA" => Ok(DNSResourceType::CAA),
            // Add more types as needed
            _ => {
                // Try to parse as numeric type
                if let Ok(num) = s.parse::<u16>() {
                    DNSResourceType::from_u16(num)
                        .ok_or_else(|| ZoneError::InvalidRRType(s.to_string()))
                } else {
                    Err(ZoneError::InvalidRRType(s.to_string()))
                }
            }
        }
    }

    /// Parse $GENERATE range specification
    fn parse_generate_range(&self, range_str: &str) -> Result<(u32, u32, u32)> {
        // Format: start-stop[/step]
        let parts: Vec<&str> = range_str.split('/').collect();

        let (start, stop) = if let Some(dash_pos) = parts[0].find('-') {
            let start_str = &parts[0][..dash_pos];
            let stop_str = &parts[0][dash_pos + 1..];

            let start = start_str.parse::<u32>().map_err(|_| {
                ZoneError::ParseError(format!("Invalid $GENERATE start: {}", start_str))
            })?;
            let stop = stop_str.parse::<u32>().map_err(|_| {
                ZoneError::ParseError(format!("Invalid $GENERATE stop: {}", stop_str))
            })?;

            (start, stop)
        } else {
            return Err(ZoneError::ParseError(
                "$GENERATE range must contain '-'".to_string(),
            ));
        };

        let step = if parts.len() > 1 {
            parts[1].parse::<u32>().map_err(|_| {
                ZoneError::ParseError(format!("Invalid $GENERATE step: {}", parts[1]))
            })?
        } else {
            1
        };

        if start > stop {
            return Err(ZoneError::ParseError(
                "$GENERATE start must be <= stop".to_string(),
            ));
        }

        if step == 0 {
            return Err(ZoneError::ParseError(
                "$GENERATE step must be > 0".to_string(),
            ));
        }

        Ok((start, stop, step))
    }

    /// Expand $GENERATE format specifiers
    fn expand_generate_format(&self, template: &str, value: u32) -> Result<String> {
        let mut result = String::new();
        let mut chars = template.chars();

        while let Some(ch) = chars.next() {
            if ch == '$' && chars.as_str().starts_with('{') {
                // Skip the '{'
                chars.next();

                // Find the closing '}'
                let mut spec = String::new();
                let mut found_close = false;

                for ch in chars.by_ref() {
                    if ch == '}' {
                        found_close = true;
                        break;
                    }
                    spec.push(ch);
                }

                if !found_close {
                    return Err(ZoneError::ParseError(
                        "Unclosed ${} in $GENERATE".to_string(),
                    ));
                }

                // Parse the format spec: offset,width,base
                let parts: Vec<&str> = spec.split(',').collect();
                if parts.len() != 3 {
                    return Err(ZoneError::ParseError(
                        "Invalid $GENERATE format, expected ${offset,width,base}".to_string(),
                    ));
                }

                let offset = parts[0]
                    .parse::<u32>()
                    .map_err(|_| ZoneError::ParseError(format!("Invalid offset: {}", parts[0])))?;
                let width = parts[1]
                    .parse::<usize>()
                    .map_err(|_| ZoneError::ParseError(format!("Invalid width: {}", parts[1])))?;
                let base = parts[2];

                let adjusted_value = value + offset;
                let formatted = match base {
                    "d" => format!("{:0width$}", adjusted_value, width = width),
                    "o" => format!("{:0width$o}", adjusted_value, width = width),
                    "x" => format!("{:0width$x}", adjusted_value, width = width),
                    "X" => format!("{:0width$X}", adjusted_value, width = width),
                    _ => {
                        return Err(ZoneError::ParseError(format!(
                            "Invalid base '{}', expected d, o, x, or X",
                            base
                        )));
                    }
                };

                result.push_str(&formatted);
            } else {
                result.push(ch);
            }
        }

        Ok(result)
    }
}

impl Default for ZoneParser {
    fn default() -> Self {
        Self::new()
    }
}
