use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use vigil_dns::cache::{DnsCache, Kind, TrustState};
use vigil_dns::dns::DNSPacket;
use vigil_dns::dns::enums::{DNSResourceClass, DNSResourceType};

fn sample_response(name: &str) -> DNSPacket {
    DNSPacket::new_query(
        1,
        name.split('.').map(|l| l.to_string()).collect(),
        DNSResourceType::A,
    )
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sharded_cache_insert");
    for size in [1_000usize, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let cache = DnsCache::new(size * 2, size * 2);
            let mut i = 0u64;
            b.iter(|| {
                let name = format!("host{}.example.com", i % size as u64);
                let labels: Vec<String> = name.split('.').map(|s| s.to_string()).collect();
                cache.insert(
                    &labels,
                    DNSResourceType::A,
                    DNSResourceClass::IN,
                    sample_response(&name),
                    Kind::Positive,
                    TrustState::Secure,
                    300,
                );
                i += 1;
            });
        });
    }
    group.finish();
}

fn bench_lookup_hit(c: &mut Criterion) {
    let cache = DnsCache::new(10_000, 10_000);
    for i in 0..10_000u64 {
        let name = format!("host{}.example.com", i);
        let labels: Vec<String> = name.split('.').map(|s| s.to_string()).collect();
        cache.insert(
            &labels,
            DNSResourceType::A,
            DNSResourceClass::IN,
            sample_response(&name),
            Kind::Positive,
            TrustState::Secure,
            300,
        );
    }

    let question = vigil_dns::dns::question::DNSQuestion {
        labels: "host42.example.com"
            .split('.')
            .map(|s| s.to_string())
            .collect(),
        qtype: DNSResourceType::A,
        qclass: DNSResourceClass::IN,
    };

    c.bench_function("sharded_cache_lookup_hit", |b| {
        b.iter(|| black_box(cache.lookup(black_box(&question))));
    });
}

criterion_group!(benches, bench_insert, bench_lookup_hit);
criterion_main!(benches);
