//! Ingest Worker Service - Entry Point
//!
//! Background worker that drains the ingest request queue.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    ingest_worker::run().await
}
