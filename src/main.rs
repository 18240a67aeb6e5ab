use medguard::run;

fn main() -> anyhow::Result<()> {
    run()
}
