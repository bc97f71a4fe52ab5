use cif_gtfs::converter::Converter;
use cif_gtfs::{Config, Error};
use clap::Parser;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use zip::ZipArchive;

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Convert ATCO-CIF timetables into a GTFS feed.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ATCO-CIF files, directories or zip archives
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Bank holiday dates, one yyyymmdd date or yyyymmdd,yyyymmdd range per line
    #[arg(short = 'b', long = "bank_holidays")]
    bank_holidays: Option<PathBuf>,

    /// Keep inbound journeys on their own route
    #[arg(short = 'd', long = "directional_routes")]
    directional_routes: bool,

    /// EPSG code of the grid references (27700, 29900, 29903 or 2157)
    #[arg(short = 'e', long = "epsg")]
    epsg: Option<u32>,

    /// Last date of open-ended journeys, yyyymmdd
    #[arg(short = 'f', long = "final_date")]
    final_date: Option<String>,

    /// Figures of the grid references, best fit per stop when unset
    #[arg(short = 'r', long = "grid")]
    grid: Option<u8>,

    /// Output GTFS archive
    #[arg(short = 'g', long = "gtfs", default_value = "gtfs.zip")]
    gtfs: PathBuf,

    /// Write the log to this file instead of the console
    #[arg(short = 'l', long = "log")]
    log: Option<PathBuf>,

    /// GTFS route_type of every route
    #[arg(short = 'm', long = "mode", default_value_t = 3)]
    mode: u16,

    /// Suffix identifiers with their source number so no two sources merge
    #[arg(short = 'u', long = "unique_ids")]
    unique_ids: bool,

    /// Report every record processed
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// School term periods, one yyyymmdd,yyyymmdd range per line
    #[arg(short = 's', long = "school_term")]
    school_term: Option<PathBuf>,

    /// Timezone of every agency
    #[arg(short = 't', long = "timezone", default_value = "Europe/London")]
    timezone: String,
}

impl Args {
    fn config(&self) -> Result<Config, Error> {
        let mut config = Config::new().with_mode(self.mode);
        config.directional_routes = self.directional_routes;
        config.unique_ids = self.unique_ids;
        config.timezone = self.timezone.clone();
        if let Some(code) = self.epsg {
            config = config.with_epsg(code)?;
        }
        if let Some(date) = &self.final_date {
            config = config.with_final_date(date)?;
        }
        if let Some(figures) = self.grid {
            config = config.with_grid_figures(figures)?;
        }
        if let Some(path) = &self.bank_holidays {
            config = config.with_bank_holiday_file(path)?;
        }
        if let Some(path) = &self.school_term {
            config = config.with_school_term_file(path)?;
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> std::io::Result<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    if let Some(path) = log_file {
        let file = File::create(path)?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} {} {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args()
                )
            });
    }
    builder.init();
    Ok(())
}

/// Ingest a file, every file below a directory, or every member of an archive.
/// Whatever cannot be opened or unpacked is reported as skipped.
fn ingest_path(converter: &mut Converter, path: &Path) {
    let label = path.display().to_string();
    if path.is_dir() {
        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => return converter.reject(&label, &e),
        };
        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(e) => converter.reject(&label, &e),
            }
        }
        paths.sort();
        for entry in paths {
            ingest_path(converter, &entry);
        }
        return;
    }

    if let Err(e) = ingest_file(converter, &label, path) {
        converter.reject(&label, &e);
    }
}

fn ingest_file(converter: &mut Converter, label: &str, path: &Path) -> Result<(), Error> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    let is_zip = file.read_exact(&mut magic).is_ok() && &magic == ZIP_MAGIC;
    file.seek(SeekFrom::Start(0))?;
    if is_zip {
        ingest_archive(converter, label, BufReader::new(file))?;
    } else {
        ingest_text(converter, label, BufReader::new(file));
    }
    Ok(())
}

/// Fails only when the archive itself cannot be opened. Unreadable members
/// and nested archives are skipped one by one.
fn ingest_archive<R: Read + Seek>(converter: &mut Converter, label: &str, reader: R) -> Result<(), Error> {
    let mut archive = ZipArchive::new(reader)?;
    for i in 0..archive.len() {
        let mut member = match archive.by_index(i) {
            Ok(member) => member,
            Err(e) => {
                converter.reject(&format!("{} entry {}", label, i + 1), &e);
                continue;
            }
        };
        if member.is_dir() {
            continue;
        }
        let member_label = format!("{}/{}", label, member.name());
        let mut bytes = Vec::new();
        if let Err(e) = member.read_to_end(&mut bytes) {
            converter.reject(&member_label, &e);
            continue;
        }
        if bytes.starts_with(ZIP_MAGIC) {
            if let Err(e) = ingest_archive(converter, &member_label, Cursor::new(bytes)) {
                converter.reject(&member_label, &e);
            }
        } else {
            ingest_text(converter, &member_label, Cursor::new(bytes));
        }
    }
    Ok(())
}

fn ingest_text<R: BufRead>(converter: &mut Converter, label: &str, reader: R) {
    match converter.ingest_reader(label, reader) {
        Ok(summary) => log::debug!(
            "{}: {} journeys from {} lines",
            label,
            summary.journeys,
            summary.lines
        ),
        Err(e) => log::warn!("{}", e),
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = args.config()?;
    let mut converter = Converter::new(config);

    for source in &args.sources {
        let text = source.to_string_lossy();
        if text.starts_with("http://") || text.starts_with("https://") {
            log::warn!("skipped {}: network sources must be downloaded first", text);
            continue;
        }
        ingest_path(&mut converter, source);
    }

    let feed = converter.finalize()?;
    feed.check_references()?;
    if args.verbose {
        feed.log_stats();
        log::info!("{}", converter.report(&feed));
    }
    feed.write_to_path(&args.gtfs)?;
    log::info!("GTFS written to {}", args.gtfs.display());
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(args.verbose, args.log.as_deref()) {
        eprintln!("impossible to open log file: {}", e);
        return ExitCode::FAILURE;
    }
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
