use {aggregator::arguments::Arguments, clap::Parser};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aggregator::run(Arguments::parse()).await
}
