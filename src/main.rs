use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use gradeink::{
    compositor::compose_with_report,
    configuration::GraderConfiguration,
    error::{ContextError, ErrorKind},
    gateway::{file_url, LocalGateway, PersistenceGateway as _},
    session::GradingSession,
    stroke::StrokeList,
};

#[derive(Parser)]
#[command(version, long_about = None)]
struct CliArguments {
    #[arg(
        long = "configuration",
        global = true,
        help = "Path to the configuration file in the JSON format"
    )]
    configuration_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Registers a new submission waiting to be reviewed
    Register {
        #[arg(long = "submission", help = "Identifier of the submission")]
        submission_id: String,
        #[arg(long = "pdf", help = "Path or URL of the submitted PDF document")]
        pdf: String,
    },
    /// Burns strokes into a PDF document without touching any record
    Compose {
        #[arg(long = "source", help = "Path to the PDF document to draw onto")]
        source_path: PathBuf,
        #[arg(long = "strokes", help = "Path to the strokes in the JSON format")]
        strokes_path: PathBuf,
        #[arg(long = "output", help = "Path the annotated PDF document is written to")]
        output_path: PathBuf,
    },
    /// Saves the review of a submission, burning the strokes into its document
    Grade {
        #[arg(long = "submission", help = "Identifier of the submission")]
        submission_id: String,
        #[arg(long = "strokes", help = "Path to the strokes in the JSON format")]
        strokes_path: Option<PathBuf>,
        #[arg(long = "marks", help = "Marks awarded, leave out to keep the current ones")]
        marks: Option<String>,
        #[arg(long = "feedback", help = "Feedback, leave out to keep the current one")]
        feedback: Option<String>,
    },
    /// Prints the grading record of a submission
    Show {
        #[arg(long = "submission", help = "Identifier of the submission")]
        submission_id: String,
    },
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{} ({})", error, error.kind);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    let CliArguments {
        configuration_path,
        command,
    } = CliArguments::parse();

    let configuration = match &configuration_path {
        Some(configuration_path) => GraderConfiguration::from_path(configuration_path),
        None => Ok(GraderConfiguration::default()),
    };
    // The logger is needed to report a broken configuration too
    let log_filter = configuration
        .as_ref()
        .map_or("info".to_string(), |configuration| configuration.log_filter.clone());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter)).init();
    let configuration = configuration?;

    let gateway = LocalGateway::new(&configuration.storage_directory);
    match command {
        Command::Register { submission_id, pdf } => {
            let pdf_url = if Path::new(&pdf).exists() {
                file_url(Path::new(&pdf))?
            } else {
                pdf
            };
            let record = gateway.register_submission(&submission_id, &pdf_url)?;
            print_json(&record)
        }
        Command::Compose {
            source_path,
            strokes_path,
            output_path,
        } => {
            let source_pdf_bytes = read_input(&source_path)?;
            let strokes = StrokeList::from_json(&read_input(&strokes_path)?)?;
            let (pdf_bytes, report) = compose_with_report(&source_pdf_bytes, strokes.as_slice())?;
            std::fs::write(&output_path, pdf_bytes).map_err(|error| {
                ContextError::with_error(
                    ErrorKind::Serialization,
                    format!("Unable to write the PDF document to {:?}", output_path),
                    &error,
                )
            })?;
            log::info!(
                "Drew {} of {} strokes into {:?}",
                report.strokes_drawn,
                strokes.len(),
                output_path
            );
            Ok(())
        }
        Command::Grade {
            submission_id,
            strokes_path,
            marks,
            feedback,
        } => {
            let record = gateway.load_record(&submission_id)?;
            let mut session = GradingSession::new(record, configuration.pen());
            if let Some(strokes_path) = strokes_path {
                session.import_strokes(StrokeList::from_json(&read_input(&strokes_path)?)?);
            }
            if let Some(marks) = marks {
                session.set_marks(marks);
            }
            if let Some(feedback) = feedback {
                session.set_feedback(feedback);
            }

            let record = session.save(&gateway, &configuration.reviewer)?;
            print_json(record)
        }
        Command::Show { submission_id } => print_json(&gateway.load_record(&submission_id)?),
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>, ContextError> {
    std::fs::read(path).map_err(|error| {
        ContextError::with_error(
            ErrorKind::InvalidInput,
            format!("Unable to read the file {:?}", path),
            &error,
        )
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ContextError> {
    let json = serde_json::to_string_pretty(value).map_err(|error| {
        ContextError::with_error(ErrorKind::Serialization, "Unable to serialize the output", &error)
    })?;
    println!("{}", json);

    Ok(())
}
