use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::Rng;

use frag_core::timer::NoopTimer;
use frag_core::{DefragConfig, IpDefragmenter, NetworkHeaderParams, PacketBuffer, Route};

struct SinkRoute;

impl Route for SinkRoute {
    fn max_header_length(&self) -> usize {
        34
    }
    fn default_ttl(&self) -> u8 {
        64
    }
    fn write_packet(
        &self,
        _params: NetworkHeaderParams,
        _packet: PacketBuffer,
    ) -> std::io::Result<()> {
        Ok(())
    }
}

// 生成一个数据报的全部分片
fn generate_fragments(total: usize, fragment_size: usize) -> Vec<(u16, u16, bool, Bytes)> {
    let mut rng = rand::thread_rng();
    let mut buffer = vec![0u8; total];
    rng.fill(&mut buffer[..]);

    let mut fragments = Vec::new();
    let mut offset = 0;
    while offset < total {
        let end = (offset + fragment_size).min(total);
        fragments.push((
            offset as u16,
            (end - 1) as u16,
            end != total,
            Bytes::copy_from_slice(&buffer[offset..end]),
        ));
        offset = end;
    }
    fragments
}

fn bench_reassembly(c: &mut Criterion) {
    let mut group = c.benchmark_group("reassemble_datagram");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(100);

    let header = Bytes::from_static(&[0x45u8; 20]);
    let fragment_sizes = [512usize, 1024, 1480, 8192];

    for size in fragment_sizes.iter() {
        let fragments = generate_fragments(32 * 1024, *size);

        group.bench_with_input(
            BenchmarkId::new("fragment_size", size),
            &fragments,
            |b, fragments| {
                let defrag = IpDefragmenter::new(DefragConfig::default(), Arc::new(NoopTimer));
                let route: Arc<dyn Route> = Arc::new(SinkRoute);
                let mut id = 0u32;
                b.iter(|| {
                    id = id.wrapping_add(1);
                    let mut result = None;
                    for (first, last, more, payload) in fragments.iter() {
                        result = Some(
                            defrag
                                .process(
                                    id,
                                    *first,
                                    *last,
                                    *more,
                                    payload.clone(),
                                    header.clone(),
                                    route.clone(),
                                )
                                .unwrap(),
                        );
                    }
                    black_box(result)
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_reassembly);
criterion_main!(benches);
