use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;

use sm_campaigner::config::{CampaignConfig, SmtpSettings};
use sm_campaigner::generator::DraftGenerator;
use sm_campaigner::logger::CampaignLogger;
use sm_campaigner::mailer::SmtpMailer;
use sm_campaigner::runner;

#[tokio::main]
async fn main() {
    let matches = Command::new("sm-campaigner")
        .version(env!("CARGO_PKG_VERSION"))
        .about("AI-assisted campaign email generation and sending")
        .arg(
            Arg::new("preview")
                .long("preview")
                .help("Generate drafts for preview without sending")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("markdown")
                .long("markdown")
                .help("Generate drafts as markdown output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("send-folder")
                .long("send-folder")
                .value_name("FOLDER")
                .help("Send previously generated drafts from an output folder")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("sandbox")
                .long("sandbox")
                .help("Use the sandbox SMTP profile (default)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("production")
                .long("production")
                .help("Use the production SMTP profile")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding addresses.yml, project.yml and mailing.yml")
                .default_value("config"),
        )
        .arg(
            Arg::new("base-dir")
                .long("base-dir")
                .value_name("DIR")
                .help("Base directory for output/, logs/ and archive/")
                .default_value("."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    dotenvy::dotenv().ok();

    if let Err(e) = run(&matches).await {
        eprintln!("Error: {e:?}");
        process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let base_dir = PathBuf::from(
        matches
            .get_one::<String>("base-dir")
            .map(String::as_str)
            .unwrap_or("."),
    );

    if let Some(folder) = matches.get_one::<String>("send-folder") {
        let production = matches.get_flag("production");
        let settings = SmtpSettings::from_env(production)?;
        log::info!("Sending drafts from {folder} ({})", settings.environment());

        let mailer = SmtpMailer::new(settings)?;
        mailer.verify().await?;

        let mut logger = CampaignLogger::new(&base_dir, folder);
        let run = runner::run_send(&base_dir, folder, &mailer, &mut logger).await?;

        println!("Campaign finished: {:?}", run.stats.campaign_status);
        println!("  Total emails:   {}", run.stats.total_emails);
        println!("  Successful:     {}", run.stats.successful_sends);
        println!("  Failed:         {}", run.stats.failed_sends);
        println!(
            "  Summary file:   {}",
            run.log_dir.join(&run.summary_file).display()
        );
    } else {
        let config_dir = PathBuf::from(
            matches
                .get_one::<String>("config-dir")
                .map(String::as_str)
                .unwrap_or("config"),
        );
        let config = CampaignConfig::load(&config_dir)?;
        let generator = DraftGenerator::from_env()?;

        let campaign_type = if matches.get_flag("markdown") {
            "markdown"
        } else if matches.get_flag("preview") {
            "preview"
        } else {
            "send"
        };

        let saved = runner::run_generation(&base_dir, &config, &generator, campaign_type).await?;
        println!("Generated {} drafts", saved.len());
        if let Some(first) = saved.first() {
            println!("  Campaign folder: {}", first.directory);
        }
    }

    Ok(())
}
