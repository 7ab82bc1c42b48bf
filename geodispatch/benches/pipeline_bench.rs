//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geodispatch::config::DispatchConfig;
use geodispatch::core::{JobSnapshot, ScheduleType, TriggerMetadata, TriggerType};
use geodispatch::discovery::route_job;
use geodispatch::pipeline::Pipeline;
use geodispatch::testing::{JobFixture, TestPorts};
use serde_json::json;
use std::sync::Arc;

fn mixed_jobs(n: usize) -> Vec<JobSnapshot> {
    (0..n)
        .map(|i| {
            let name = format!("job-{i}");
            match i % 5 {
                0 => JobFixture::anomaly(&name)
                    .payload("severity", json!("critical"))
                    .build(),
                1 => JobFixture::monitoring(&name).schedule(ScheduleType::Cron).build(),
                2 => JobFixture::metric(&name).points(150).build(),
                3 => JobFixture::change_analysis(&name).build(),
                _ => JobFixture::fetch_data(&name).build(),
            }
        })
        .collect()
}

fn routing_benchmark(c: &mut Criterion) {
    let jobs = mixed_jobs(100);
    c.bench_function("route_job_100", |b| {
        b.iter(|| {
            for job in &jobs {
                black_box(route_job(black_box(job), 100).ok());
            }
        });
    });
}

fn pipeline_benchmark(c: &mut Criterion) {
    let jobs = mixed_jobs(50);
    let config = Arc::new(DispatchConfig::default().with_min_interval_minutes(0));

    c.bench_function("job_discovery_run_50", |b| {
        b.iter(|| {
            let ports = TestPorts::new().with_jobs(jobs.iter().cloned());
            let Ok(pipeline) = Pipeline::job_discovery(ports.ports(), config.clone()) else {
                return;
            };
            let result = tokio_test::block_on(
                pipeline.run(TriggerType::Manual, TriggerMetadata::new()),
            );
            black_box(result.jobs_queued);
        });
    });
}

criterion_group!(benches, routing_benchmark, pipeline_benchmark);
criterion_main!(benches);
