use anyhow::Context;
use clap::Parser;
use log::LevelFilter;

use vdfscope::app::{App, Outcome};
use vdfscope::cli::{Cli, Config};
use vdfscope::import_list::ImportList;
use vdfscope::pipeline::run_import_blocking;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli).context("failed to build configuration")?;
    init_logging(&config);

    if config.list_only {
        let list = run_import_blocking(
            config.layout.clone(),
            &config.dropped_profiles,
            config.list_timeout,
        )
            .context("profile import failed")?;
        print_list(&list, &config);
        return Ok(());
    }

    let mut app = App::new(config);
    match app.run().context("application runtime failed")? {
        Outcome::Import(path) => println!("{}", path.display()),
        Outcome::Quit => {}
    }

    Ok(())
}

fn init_logging(config: &Config) {
    // The TUI owns the terminal, so it stays quiet unless asked.
    let level = match (config.verbose, config.list_only) {
        (true, _) => LevelFilter::Debug,
        (false, true) => LevelFilter::Warn,
        (false, false) => LevelFilter::Off,
    };
    let mut builder = colog::default_builder();
    builder.filter(None, level);
    builder.init();
}

fn print_list(list: &ImportList, config: &Config) {
    for row in list.rows() {
        let index = row
            .index
            .map(|index| index.to_string())
            .unwrap_or_else(|| "-".to_string());
        let file = row
            .profile_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        println!(
            "{index}\t{}\t{}\t{file}",
            row.owner_label(),
            row.item_label()
        );
    }
    if !list.is_settled() {
        eprintln!(
            "warning: gave up waiting after {}s; {} rows unresolved",
            config.list_timeout.as_secs(),
            list.unresolved_rows()
        );
    }
}
