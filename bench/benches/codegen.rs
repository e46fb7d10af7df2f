use bench::synthetic_source;
use criterion::{criterion_group, criterion_main, Criterion};
use ember::{
    codegen::{generate, Options},
    fold::fold,
    lexer,
    parser::parse,
    token::TokenStream,
};
use std::hint::black_box;

fn criterion_benchmark(c: &mut Criterion) {
    let input = synthetic_source(200);
    let ast = parse(TokenStream::new(lexer::lex_in_new(&input))).unwrap();
    let program = fold(&ast).unwrap();
    let options = Options::default();

    c.bench_function("codegen", |b| {
        b.iter(|| black_box(generate(black_box(&program), &options).unwrap()));
    });
    c.bench_function("print", |b| {
        let module = generate(&program, &options).unwrap();
        b.iter(|| black_box(module.to_string()));
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
