// translate.rs - Benchmarks for change translation
//
// Run with: cargo bench --bench translate
// Compare baselines: cargo bench --bench translate -- --baseline before

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tower_lsp::lsp_types::{Position, Range, TextEdit};

use bufsync::changes::{text_edits_to_descriptors, translate, ChangeDescriptor};

/// Deterministic Go source with `functions` small functions.
fn go_source(functions: usize) -> String {
    let mut source = String::from("package bench\n\nimport \"fmt\"\n");
    for i in 0..functions {
        source.push_str(&format!(
            "\nfunc f{i}(x int) int {{\n\tfmt.Println(x)\n\treturn x + {i}\n}}\n"
        ));
    }
    source
}

fn bench_translate_single_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_single_line");
    for functions in [10usize, 100, 1000] {
        let source = go_source(functions);
        let middle = (source.lines().count() / 2) as u32;
        let changes = vec![ChangeDescriptor::new(
            middle,
            middle + 1,
            vec!["\treturn x * 2".to_string()],
        )];
        group.bench_with_input(BenchmarkId::from_parameter(functions), &source, |b, source| {
            b.iter(|| translate(black_box(source), black_box(&changes)).unwrap())
        });
    }
    group.finish();
}

fn bench_translate_many_changes(c: &mut Criterion) {
    let source = go_source(200);
    // One inserted comment every tenth line, offsets shifting as they apply
    let changes: Vec<_> = (0..50u32)
        .map(|i| ChangeDescriptor::new(i * 11 + 1, i * 11 + 1, vec![format!("// note {i}")]))
        .collect();
    c.bench_function("translate_50_insertions", |b| {
        b.iter(|| translate(black_box(&source), black_box(&changes)).unwrap())
    });
}

fn bench_text_edits(c: &mut Criterion) {
    let source = go_source(200);
    let edits: Vec<_> = (0..200u32)
        .map(|i| {
            // `fN` in each function header
            let line = 4 + i * 5;
            TextEdit::new(
                Range::new(Position::new(line, 5), Position::new(line, 6)),
                "g".to_string(),
            )
        })
        .collect();
    c.bench_function("text_edits_to_descriptors_200", |b| {
        b.iter(|| text_edits_to_descriptors(black_box(&source), black_box(&edits)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_translate_single_line,
    bench_translate_many_changes,
    bench_text_edits
);
criterion_main!(benches);
