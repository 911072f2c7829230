//! Benchmarks for pipeline execution.

use conveyor::context::PipelineContext;
use conveyor::pipeline::PipelineExecutor;
use conveyor::stages::NoOpStage;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

fn pipeline_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("execute_noop_pipeline", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut executor = PipelineExecutor::new();
                for i in 0..4 {
                    executor.add_stage(Arc::new(NoOpStage::new(format!("noop-{i}"))));
                }
                let ctx = PipelineContext::new();
                black_box(executor.execute(&ctx).await.unwrap());
            });
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
