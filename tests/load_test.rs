//! Load testing for the gateway.

use std::time::Instant;

mod common;

#[tokio::test]
async fn test_load_performance() {
    // 1. Setup backend and gateway
    let backend = common::start_echo_backend("b1").await;
    let config = common::static_config(&[("order-service", backend)]);
    let gateway = common::spawn_gateway(config).await;

    // 2. Run load
    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = gateway.url("/order-service/orders");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    let rps = total_requests as f64 / duration.as_secs_f64();

    assert_eq!(all_latencies.len(), total_requests, "every request should succeed");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", rps);
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    gateway.stop().await;
}
