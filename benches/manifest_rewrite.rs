use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::fmt::Write;
use streamgate::hls::ManifestRewriter;
use streamgate::server::url_validation::AllowList;
use url::Url;

/// Media playlist with `segments` entries, a key rotation every 50 segments
/// and a few references to a host that is not allowed.
fn media_playlist(segments: usize) -> String {
    let mut playlist = String::with_capacity(segments * 48);
    let _ = writeln!(playlist, "#EXTM3U");
    let _ = writeln!(playlist, "#EXT-X-VERSION:6");
    let _ = writeln!(playlist, "#EXT-X-TARGETDURATION:6");
    let _ = writeln!(playlist, "#EXT-X-MAP:URI=\"init.mp4\"");

    for i in 0..segments {
        if i % 50 == 0 {
            let _ = writeln!(
                playlist,
                "#EXT-X-KEY:METHOD=AES-128,URI=\"keys/{}.bin\",IV=0x{:032x}",
                i / 50,
                i
            );
        }
        let _ = writeln!(playlist, "#EXTINF:6.000,");
        if i % 97 == 0 {
            let _ = writeln!(playlist, "https://ads.example.net/slot/{}.ts", i);
        } else {
            let _ = writeln!(playlist, "seg_{:05}.m4s", i);
        }
    }

    let _ = writeln!(playlist, "#EXT-X-ENDLIST");
    playlist
}

fn bench_rewrite(c: &mut Criterion) {
    let base = Url::parse("https://movies.solargentinotv.com.ar/show/s01e01/1080p/index.m3u8")
        .expect("valid base");
    let allow_list = AllowList::new(["movies.solargentinotv.com.ar", "cdn.jsdelivr.net"]);
    let rewriter = ManifestRewriter::new(&base, &allow_list);

    let mut group = c.benchmark_group("manifest_rewrite");
    for segments in [100usize, 1_000, 10_000] {
        let playlist = media_playlist(segments);
        group.bench_with_input(
            BenchmarkId::from_parameter(segments),
            &playlist,
            |b, playlist| b.iter(|| rewriter.rewrite(black_box(playlist))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_rewrite);
criterion_main!(benches);
