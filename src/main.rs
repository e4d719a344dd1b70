use std::path::PathBuf;

use clap::Parser;
use lazymover_core::date::DateSource;
use lazymover_core::{CancellationToken, Report, SortControl, SortOptions};

const BANNER: &str = r"
    __                      __  ___
   / /   ____ _____  __  __/  |/  /___ _   _____  _____
  / /   / __ `/_  / / / / / /|_/ / __ \ | / / _ \/ ___/
 / /___/ /_/ / / /_/ /_/ / /  / / /_/ / |/ /  __/ /
/_____/\__,_/ /___/\__, /_/  /_/\____/|___/\___/_/
                  /____/
";

#[derive(Parser)]
#[command(
    name = "lazymover",
    version,
    about = "Move media files into dest_dir/YYYY/MM/DD/sorted_<filename>",
    long_about = "Move media files into dest_dir/YYYY/MM/DD/sorted_<filename>.\n\n\
        Images are dated by their EXIF DateTime tag; everything else, and images \
        without a usable tag, by the file's modification time (local time)."
)]
struct Cli {
    /// Root directory of the media to sort
    source_dir: PathBuf,

    /// Root directory the sorted files are MOVED into
    dest_dir: PathBuf,

    /// Show what would be moved without touching anything
    #[arg(short, long)]
    dry_run: bool,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

fn print_report(r: &Report) {
    match r {
        Report::DirEntered { path } => println!("Processing Dir: {}", path.display()),
        Report::ImageRejected { path, reason } => println!(
            "\tNot an image or non valid image file: {} ({})",
            path.display(),
            reason
        ),
        Report::FileStarted {
            path,
            is_image,
            kind,
        } => {
            if *is_image {
                println!("\tProcessing Image: {}", path.display());
            } else {
                println!("\tProcessing non-image file: {} ({})", path.display(), kind);
            }
        }
        Report::DateResolved { bucket, source, .. } => match source {
            DateSource::Metadata => println!("\t\tEXIF DateTime tag: {}", bucket),
            DateSource::ModifiedTime(reason) => {
                println!("\t\tModified stat date: {} ({})", bucket, reason)
            }
        },
        Report::Planned { destination, .. } => {
            println!("\t\t[DRYRUN move to] {}", destination.display())
        }
        Report::Moved { destination, .. } => println!("\t\tMoved to {}", destination.display()),
        Report::FileFailed { path, error } => {
            eprintln!("\t\tERROR {}: {}", path.display(), error)
        }
        Report::WalkError { message } => eprintln!("ERROR walking: {}", message),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    println!("{}", BANNER);
    let t_total = std::time::Instant::now();

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || {
            eprintln!("Interrupted, stopping after the current file...");
            token.cancel();
        })?;
    }

    let options = SortOptions {
        source: cli.source_dir,
        destination: cli.dest_dir,
        dry_run: cli.dry_run,
    };
    let control = SortControl::new().with_cancel_token(token);

    let result = lazymover_core::sort_tree_with_control(&options, &control, &print_report)?;

    if let Some(path) = &cli.report {
        result.write_json(path)?;
    }

    let moved = if options.dry_run {
        format!("{} planned (dry run)", result.planned)
    } else {
        format!("{} moved", result.relocated)
    };
    eprintln!(
        "Done! {} files ({} images, {} videos, {} other), {}, {} dated by EXIF, {} by modification time, {} failed ({:.2}s)",
        result.files_seen,
        result.images,
        result.videos,
        result.others,
        moved,
        result.dated_by_metadata,
        result.dated_by_mtime,
        result.failed,
        t_total.elapsed().as_secs_f64()
    );

    if result.failed > 0 {
        anyhow::bail!("{} file(s) could not be sorted", result.failed);
    }
    Ok(())
}
