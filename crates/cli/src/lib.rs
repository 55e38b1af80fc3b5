pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Local, Timelike};
use clap::{Args, Parser, Subcommand};
use ziwu_core::{DiagnosisRequest, MedicalRecord, TimeBranch, TimeInfo};

#[derive(Debug, Parser)]
#[command(
    name = "ziwu",
    about = "Ziwu diagnosis operator CLI",
    long_about = "Inspect configuration, check readiness, render prompts offline, and run one-off diagnoses.",
    after_help = "Examples:\n  ziwu doctor --json\n  ziwu config\n  ziwu prompt --complaint 失眠多梦 --visit 子 --worse 子,丑\n  ziwu diagnose --complaint 咳嗽 --onset 寅\n  ziwu prompt --complaint 心悸 --visit-now"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, model client setup, and rule document readability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Render the exact system and user prompts for a case without calling the model")]
    Prompt(CaseArgs),
    #[command(about = "Run one diagnosis against the configured endpoint and print the envelope")]
    Diagnose(CaseArgs),
}

/// One consultation as entered on the command line.
#[derive(Clone, Debug, Default, Args)]
pub struct CaseArgs {
    #[arg(long, help = "Chief complaint (required)")]
    pub complaint: String,
    #[arg(long, help = "Past history")]
    pub history: Option<String>,
    #[arg(long = "tongue-pulse", help = "Tongue and pulse findings")]
    pub tongue_pulse: Option<String>,
    #[arg(long, help = "Visit time branch, e.g. 子")]
    pub visit: Option<TimeBranch>,
    #[arg(
        long,
        conflicts_with = "visit",
        help = "Use the branch of the current local hour as the visit time"
    )]
    pub visit_now: bool,
    #[arg(long, help = "Onset time branch")]
    pub onset: Option<TimeBranch>,
    #[arg(long, value_delimiter = ',', help = "Aggravation time branches, comma separated")]
    pub worse: Vec<TimeBranch>,
    #[arg(long, help = "Rule document path; overrides rules.path from config")]
    pub rules: Option<PathBuf>,
}

impl CaseArgs {
    pub fn to_request(&self) -> DiagnosisRequest {
        let mut record = MedicalRecord::new(self.complaint.clone());
        if let Some(history) = &self.history {
            record = record.with_history(history.clone());
        }
        if let Some(tongue_pulse) = &self.tongue_pulse {
            record = record.with_tongue_pulse(tongue_pulse.clone());
        }

        DiagnosisRequest {
            medical_record: record,
            time_info: TimeInfo {
                visit_time: self.visit_branch(),
                onset_time: self.onset,
                worse_time: self.worse.iter().copied().collect(),
            },
        }
    }

    fn visit_branch(&self) -> Option<TimeBranch> {
        self.visit.or_else(|| self.visit_now.then(|| TimeBranch::containing(Local::now().hour())))
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Prompt(case) => commands::prompt::run(&case),
        Command::Diagnose(case) => commands::diagnose::run(&case),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
