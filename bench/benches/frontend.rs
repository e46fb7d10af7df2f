use bench::synthetic_source;
use criterion::{criterion_group, criterion_main, Criterion};
use ember::{fold::fold, lexer, parser::parse, token::TokenStream};
use std::hint::black_box;

fn criterion_benchmark(c: &mut Criterion) {
    let input = synthetic_source(200);
    let mut tokens = Vec::with_capacity(lexer::SUGGESTED_TOKENS_CAPACITY * 2);

    c.bench_function("lexer", |b| {
        b.iter(|| {
            tokens.clear();
            lexer::lex(black_box(&input), &mut tokens);
            black_box(tokens.len());
        });
    });

    let lexed = lexer::lex_in_new(&input);
    c.bench_function("parser", |b| {
        b.iter(|| {
            let ast = parse(TokenStream::new(black_box(lexed.clone()))).unwrap();
            black_box(ast);
        });
    });

    let ast = parse(TokenStream::new(lexed)).unwrap();
    c.bench_function("fold", |b| b.iter(|| black_box(fold(black_box(&ast)).unwrap())));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
