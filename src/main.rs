use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::fs::{self, File};
use std::io::{self, BufWriter};

use buildplot::config::{Config, PlotsFile};
use buildplot::logging::{log, obj, v_str, Domain, Level};
use buildplot::publisher::PlotPublisher;
use buildplot::report::format_number;
use buildplot::store::RecordStore;

fn print_usage() {
    eprintln!("Usage: buildplot <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  groups                         List plot groups and their plots");
    eprintln!("  table <group> <index> [--json] [--pretty]");
    eprintln!("                                 Print one plot's pivot table");
    eprintln!("  export <group>                 Write every table in a group as CSV");
    eprintln!("  summary <store.csv>            Inspect a record store");
    eprintln!("  record <build_number>          Record series data for a build");
    eprintln!();
    eprintln!("Environment: PLOT_ROOT, PLOT_CONFIG, PLOT_WORKSPACE, PLOT_EXPORT_DIR,");
    eprintln!("             PLOT_LATEST_BUILD, LOG_LEVEL, LOG_DOMAINS, LOG_FILE");
}

fn load_publisher(cfg: &Config) -> Result<PlotPublisher> {
    let file = PlotsFile::load(&cfg.plot_config)?;
    log(
        Level::Info,
        Domain::System,
        "config_loaded",
        obj(&[
            ("path", v_str(&cfg.plot_config.display().to_string())),
            ("plots", serde_json::json!(file.plots.len())),
        ]),
    );
    Ok(PlotPublisher::new(file.plots))
}

fn cmd_groups(cfg: &Config) -> Result<()> {
    let publisher = load_publisher(cfg)?;
    for (key, name) in publisher.groups() {
        let report = publisher.report(cfg.job(), &key);
        println!("{} ({})", name, key);
        for (i, plot) in report.plots().iter().enumerate() {
            println!("  [{}] {} -> {}", i, plot.title, plot.store_file_name());
        }
    }
    Ok(())
}

fn cmd_table(cfg: &Config, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("usage: buildplot table <group> <index> [--json] [--pretty]");
    }
    let as_json = args.iter().any(|a| a == "--json");
    let pretty = args.iter().any(|a| a == "--pretty");
    let publisher = load_publisher(cfg)?;
    let report = publisher.report(cfg.job(), &args[0]);
    let Some(index) = report.resolve_index(&args[1]) else {
        bail!("no plot {} in group {}", args[1], args[0]);
    };
    let table = report.table(index);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&table.to_json())?);
    } else if pretty {
        for row in table.rows_with_header() {
            let cells: Vec<String> = row.iter().map(|c| format_number(c)).collect();
            println!("{}", cells.join("\t"));
        }
    } else {
        table.write_csv(io::stdout().lock())?;
    }
    Ok(())
}

fn cmd_export(cfg: &Config, args: &[String]) -> Result<()> {
    let Some(group) = args.first() else {
        bail!("usage: buildplot export <group>");
    };
    let publisher = load_publisher(cfg)?;
    let report = publisher.report(cfg.job(), group);
    fs::create_dir_all(&cfg.export_dir)
        .with_context(|| format!("creating {}", cfg.export_dir.display()))?;
    for (i, plot) in report.plots().iter().enumerate() {
        let out_path = cfg.export_dir.join(format!("{}-{}.csv", group, i));
        let file = File::create(&out_path).with_context(|| format!("creating {}", out_path.display()))?;
        report.table(i).write_csv(BufWriter::new(file))?;
        println!("wrote {} ({})", out_path.display(), plot.title);
    }
    Ok(())
}

fn cmd_summary(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: buildplot summary <store.csv>");
    };
    let summary = RecordStore::new(path).summarize()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn cmd_record(cfg: &Config, args: &[String]) -> Result<()> {
    let build_number: u64 = args
        .first()
        .context("usage: buildplot record <build_number>")?
        .parse()
        .context("build number must be a non-negative integer")?;
    let publisher = load_publisher(cfg)?;
    let date = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let written = publisher.record_build(&cfg.job(), &cfg.workspace, build_number, &date);
    println!("recorded {} points for build {}", written, build_number);
    Ok(())
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cfg = Config::from_env();
    let rest = &args[2..];
    match args[1].as_str() {
        "groups" => cmd_groups(&cfg),
        "table" => cmd_table(&cfg, rest),
        "export" => cmd_export(&cfg, rest),
        "summary" => cmd_summary(rest),
        "record" => cmd_record(&cfg, rest),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }
}
