use std::{
    io::{stdout, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context};
use clap::{Parser, Subcommand};
use part107::{
    read_snapshot, write_snapshot, FileCompression, FlagFields, HeaderPolicy, ReadOptions,
    Snapshot, WriteOptions,
};
use tap::Pipe;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Fail on record markers that disagree with the header
    #[arg(long, global = true)]
    pub strict_markers: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the header and array ranges
    Info { input: PathBuf },

    /// Print one parcel per line
    Dump {
        input: PathBuf,

        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Split the flag word into its fields
        #[arg(short = 'f', long)]
        decode_flags: bool,
    },

    /// Decode and write again, e.g. to (de)compress
    Convert {
        input: PathBuf,
        output: PathBuf,

        #[arg(short, long, value_enum, default_value_t = FileCompression::None)]
        compression: FileCompression,

        /// Refuse to rewrite a header record count other than 3, and refuse
        /// more active parcels than parcels in total (otherwise a warning)
        #[arg(long)]
        strict_header: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let read_options = ReadOptions {
        strict_markers: args.strict_markers,
    };

    match args.command {
        Command::Info { input } => info(&input, &read_options),
        Command::Dump {
            input,
            limit,
            decode_flags,
        } => dump(&input, &read_options, limit, decode_flags),
        Command::Convert {
            input,
            output,
            compression,
            strict_header,
        } => {
            let policy = if strict_header {
                HeaderPolicy::Strict
            } else {
                HeaderPolicy::Normalize
            };
            let write_options = WriteOptions::default()
                .compression(compression)
                .header_policy(policy);

            convert(&input, &output, &read_options, &write_options)
        }
    }
}

fn load(input: &Path, options: &ReadOptions) -> anyhow::Result<Snapshot> {
    read_snapshot(input, options).with_context(|| format!("Unable to read {}", input.display()))
}

fn info(input: &Path, options: &ReadOptions) -> anyhow::Result<()> {
    let snapshot = load(input, options)?;
    let header = &snapshot.header;
    let mut out = stdout().lock();

    writeln!(out, "lhead       {}", header.record_count)?;
    writeln!(out, "format      {}", header.format_tag)?;
    writeln!(out, "mode        {:?}", header.mode)?;
    writeln!(out, "stamp_date  {} ({})", header.stamp_date, header.stamp())?;
    writeln!(out, "itime       {}", header.itime)?;
    writeln!(out, "step        {}", header.step)?;
    writeln!(out, "numpart     {}", header.numpart)?;
    writeln!(out, "nact        {}", header.nact)?;
    writeln!(out, "idx_orgn    {}", header.idx_orgn)?;
    writeln!(
        out,
        "nact_last   O {} NM {} NH {}",
        header.nact_last_old, header.nact_last_new_massless, header.nact_last_new_heavy
    )?;

    if snapshot.is_empty() {
        writeln!(out, "empty trajectory set")?;
        return Ok(());
    }

    let summary = snapshot.parcels.summary();
    let range = |r: Option<part107::body::Range>| {
        r.map(|r| format!("{} .. {}", r.min, r.max))
            .unwrap_or_default()
    };
    writeln!(out, "flag        {:?} .. {:?}", summary.flag.0, summary.flag.1)?;
    writeln!(out, "ir (days)   {}", range(summary.ir_start_days))?;
    writeln!(out, "x           {}", range(summary.x))?;
    writeln!(out, "y           {}", range(summary.y))?;
    writeln!(out, "p           {}", range(summary.p))?;
    writeln!(out, "t           {}", range(summary.t))?;
    writeln!(
        out,
        "idx_back    {:?} .. {:?}",
        summary.idx_back.0, summary.idx_back.1
    )?;

    Ok(())
}

fn dump(
    input: &Path,
    options: &ReadOptions,
    limit: Option<usize>,
    decode_flags: bool,
) -> anyhow::Result<()> {
    let snapshot = load(input, options)?;
    let mut out = stdout().lock().pipe(BufWriter::new);

    for parcel in snapshot.parcels.iter().take(limit.unwrap_or(usize::MAX)) {
        if decode_flags {
            let fields = FlagFields::decode(parcel.flag);
            write!(
                out,
                "sat={} mod={} time_style={} vert={} region={} ",
                fields.sat,
                fields.model as u8,
                fields.time_style as u8,
                fields.vert_coord as u8,
                fields.source_region
            )?;
        } else {
            write!(out, "{} ", parcel.flag)?;
        }

        writeln!(
            out,
            "{} {} {} {} {} {}",
            parcel.ir_start, parcel.x, parcel.y, parcel.p, parcel.t, parcel.idx_back
        )?;
    }

    out.flush()?;
    Ok(())
}

fn convert(
    input: &Path,
    output: &Path,
    read_options: &ReadOptions,
    write_options: &WriteOptions,
) -> anyhow::Result<()> {
    ensure!(
        input != output,
        "Input and output must be different files"
    );

    let snapshot = load(input, read_options)?;

    let written = write_snapshot(output, &snapshot, write_options)
        .with_context(|| format!("Unable to write {}", output.display()))?;

    tracing::info!(
        parcels = snapshot.len(),
        bytes = written,
        compression = ?write_options.compression,
        "converted"
    );

    Ok(())
}
