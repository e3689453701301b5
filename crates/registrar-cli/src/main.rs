//! `registrar`: command-line client for the registrar API.
//!
//! # Usage
//!
//! ```
//! registrar --url http://localhost:8080 --user 20240001 --password secret subjects
//! registrar --config ~/.config/registrar/config.toml enroll <SUBJECT_ID>
//! ```
//!
//! Enroll and cancel print the server's outcome message. Rejections such as
//! a full subject are answers, not failures, so the exit status is non-zero
//! only when the request could not be made or was refused outright.

mod client;

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use registrar_core::{access::Principal, schedule::MeetingSlot};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "registrar", about = "Course registration from the command line")]
struct Args {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<std::path::PathBuf>,

  /// Base URL of the registrar server (default: http://localhost:8080).
  #[arg(long, env = "REGISTRAR_URL")]
  url: Option<String>,

  /// Admin username or student number.
  #[arg(long, env = "REGISTRAR_USER")]
  user: Option<String>,

  /// Password (plaintext).
  #[arg(long, env = "REGISTRAR_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Enroll in a subject.
  Enroll {
    subject_id: Uuid,
    /// Student to enroll; defaults to the signed-in student.
    #[arg(long)]
    student: Option<Uuid>,
  },
  /// Cancel an enrollment.
  Cancel {
    subject_id: Uuid,
    #[arg(long)]
    student: Option<Uuid>,
  },
  /// List subjects with remaining seats.
  Subjects {
    #[arg(long)]
    semester: Option<String>,
    /// Match on the subject name.
    #[arg(long)]
    search: Option<String>,
  },
  /// Show a student's timetable.
  Enrollments {
    #[arg(long)]
    student: Option<Uuid>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

fn pick(flag: Option<String>, file: &str) -> Option<String> {
  flag.or_else(|| (!file.is_empty()).then(|| file.to_string()))
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // Flags and env override the config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: pick(args.url, &file_cfg.url)
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: pick(args.user, &file_cfg.username).unwrap_or_default(),
    password: pick(args.password, &file_cfg.password).unwrap_or_default(),
  };
  tracing::debug!(url = %api_config.base_url, user = %api_config.username, "connecting");

  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::Enroll { subject_id, student } => {
      let reply = client.enroll(student, subject_id).await?;
      println!("{}", reply.message);
    }
    Command::Cancel { subject_id, student } => {
      let reply = client.cancel(student, subject_id).await?;
      println!("{}", reply.message);
    }
    Command::Subjects { semester, search } => {
      let listings = client
        .list_subjects(semester.as_deref(), search.as_deref())
        .await?;
      for l in listings {
        println!(
          "{}  {:<32} {:<8} {:>3}/{:<3} seats left: {:<3} {}",
          l.subject.subject_id,
          l.subject.name,
          l.subject.semester,
          l.enrolled,
          l.subject.capacity,
          l.remaining,
          format_schedule(&l.subject.schedule),
        );
      }
    }
    Command::Enrollments { student } => {
      let student_id = match student {
        Some(id) => id,
        None => match client.me().await? {
          Principal::Student(id) => id,
          Principal::Admin => bail!("--student is required when signed in as admin"),
        },
      };
      for e in client.enrollments(student_id).await? {
        println!(
          "{}  {:<32} {}",
          e.enrollment.subject_id,
          e.subject_name,
          format_schedule(&e.schedule),
        );
      }
    }
  }

  Ok(())
}

// ─── Formatting ───────────────────────────────────────────────────────────────

fn hhmm(t: NaiveTime) -> String { t.format("%H:%M").to_string() }

/// `Mon 09:00-10:30, Wed 09:00-10:30`
fn format_schedule(slots: &[MeetingSlot]) -> String {
  slots
    .iter()
    .map(|s| format!("{} {}-{}", s.day, hhmm(s.time.start), hhmm(s.time.end)))
    .collect::<Vec<_>>()
    .join(", ")
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Weekday;
  use registrar_core::schedule::TimeRange;

  #[test]
  fn schedule_is_compact() {
    let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
    let slot = |day, from, to| MeetingSlot {
      slot_id: Uuid::nil(),
      subject_id: Uuid::nil(),
      day,
      time: TimeRange::new(from, to).unwrap(),
      room_id: None,
    };
    let slots = [
      slot(Weekday::Mon, at(9, 0), at(10, 30)),
      slot(Weekday::Wed, at(13, 0), at(14, 0)),
    ];
    assert_eq!(format_schedule(&slots), "Mon 09:00-10:30, Wed 13:00-14:00");
    assert_eq!(format_schedule(&[]), "");
  }

  #[test]
  fn flag_beats_file() {
    assert_eq!(pick(Some("flag".into()), "file").as_deref(), Some("flag"));
    assert_eq!(pick(None, "file").as_deref(), Some("file"));
    assert_eq!(pick(None, ""), None);
  }
}
