use anyhow::Result;

fn main() -> Result<()> {
    proclife::cli::run()
}
