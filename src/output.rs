//! Segment artifact writers
//!
//! Each segment produces four files sharing one root name: the `.def`
//! breakpoint listing, the `.int` initial values, the `.scd` start/stop
//! schedule and the `.mtp` curve dump. A run also leaves a JSON manifest and
//! a CSV segment table next to them.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use csv::Writer;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::composite::{CompositeSynthesizer, Segment};
use crate::curve::Curve;
use crate::Result;

const GENERATOR: &str = "stressgen";
const MTP_VALUES_PER_LINE: usize = 9;

/// Files written for one segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentArtifacts {
    pub index: usize,
    pub root: String,
    pub begin: f64,
    pub end: f64,
    /// Run length of the segment on the rig, padding included [s]
    pub ftime: f64,
    /// Non-constant curves in the `.def` listing
    pub listed_curves: usize,
    /// File names, relative to the output directory
    pub files: Vec<String>,
}

/// Everything needed to trace a run back to its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub generator: String,
    pub seed: u64,
    pub tag: String,
    pub basename: String,
    pub baseline: String,
    pub perturbations: String,
    pub total_duration: f64,
    pub segments: Vec<SegmentArtifacts>,
}

/// Last four digits of `n`, zero padded.
pub fn run_tag(n: u64) -> String {
    format!("{:04}", n % 10_000)
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.6}")
}

fn header(file: &str, synth: &CompositeSynthesizer<'_>) -> String {
    format!(
        "# {file} generated by {GENERATOR}\n# from {} and {}.\n",
        synth.baseline().name(),
        synth.perturbations().name()
    )
}

/// Breakpoints of `curve` covering the segment, nine per line.
fn dump_curve(out: &mut String, curve: &Curve, segment: &Segment) {
    let window = curve.window(segment.begin, segment.end);
    let _ = write!(out, "$INPUT T='{}',\n X= ", curve.name());
    for (n, k) in window.clone().enumerate() {
        let _ = write!(out, "{:8.3},", curve.times()[k]);
        if (n + 1) % MTP_VALUES_PER_LINE == 0 {
            out.push_str("\n ");
        }
    }
    out.push_str("\n Z=");
    for (n, k) in window.enumerate() {
        let _ = write!(out, "{:12.5},", curve.values()[k]);
        if (n + 1) % MTP_VALUES_PER_LINE == 0 {
            out.push_str("\n ");
        }
    }
    out.push_str("\n$\n");
}

fn write_segment(
    synth: &CompositeSynthesizer<'_>,
    segment: &Segment,
    outdir: &Path,
    root: &str,
    seed: u64,
) -> Result<SegmentArtifacts> {
    let config = synth.config();
    let ftime = segment.duration() + 4.0 * config.time_pad;
    let names = ["def", "int", "scd", "mtp"].map(|ext| format!("{root}.{ext}"));

    let mut def = header(&names[0], synth);
    let _ = writeln!(def, "# seed= {seed}");
    let _ = writeln!(def, "$FTIME  {ftime:7.2}");
    let mut int = header(&names[1], synth);
    let mut scd = header(&names[2], synth);
    let _ = write!(
        scd,
        "START_TIME {:8.3}\nSTOP_TIME  {:8.3}\n",
        config.scd_start_time,
        ftime - config.time_pad
    );
    let mut mtp = header(&names[3], synth);
    let _ = write!(
        mtp,
        "TITLE1='{}',\nTITLE2='{}',\n",
        synth.baseline().name(),
        names[3]
    );

    let mut listed_curves = 0;
    for (curve, rendered) in synth.merged().iter().zip(synth.render(segment)) {
        if !rendered.is_omitted() {
            listed_curves += 1;
        }
        def.push_str(&rendered.listing());
        int.push_str(&rendered.initial);
        dump_curve(&mut mtp, curve, segment);
    }
    if listed_curves > config.max_def_curves {
        warn!(
            file = %names[0],
            curves = listed_curves,
            limit = config.max_def_curves,
            "too many curves in listing for the rig"
        );
    }

    let mut files = Vec::with_capacity(names.len());
    for (name, body) in names.iter().zip([def, int, scd, mtp]) {
        let path = outdir.join(name);
        fs::write(&path, body)?;
        info!(
            file = %path.display(),
            baseline = synth.baseline().name(),
            perturbations = synth.perturbations().name(),
            "generated"
        );
        files.push(name.clone());
    }

    Ok(SegmentArtifacts {
        index: segment.index,
        root: root.to_string(),
        begin: segment.begin,
        end: segment.end,
        ftime,
        listed_curves,
        files,
    })
}

fn write_segment_table(path: &Path, segments: &[SegmentArtifacts]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["index", "root", "begin", "end", "duration", "listed_curves"])?;
    for segment in segments {
        writer.write_record([
            segment.index.to_string(),
            segment.root.clone(),
            fmt_f64(segment.begin),
            fmt_f64(segment.end),
            fmt_f64(segment.end - segment.begin),
            segment.listed_curves.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every segment under `outdir` as `<basename><tag><index>.*`, then
/// the run manifest `<basename><tag>.json` and `<basename><tag>_segments.csv`.
pub fn write_segments(
    synth: &CompositeSynthesizer<'_>,
    segments: &[Segment],
    outdir: &Path,
    basename: &str,
    tag: &str,
    seed: u64,
) -> Result<RunManifest> {
    fs::create_dir_all(outdir)?;

    let mut written = Vec::with_capacity(segments.len());
    for segment in segments {
        let root = format!("{basename}{tag}{}", segment.index);
        written.push(write_segment(synth, segment, outdir, &root, seed)?);
    }
    if written.is_empty() {
        warn!("no files generated");
    }

    let manifest = RunManifest {
        generator: format!("{GENERATOR} {}", env!("CARGO_PKG_VERSION")),
        seed,
        tag: tag.to_string(),
        basename: basename.to_string(),
        baseline: synth.baseline().name().to_string(),
        perturbations: synth.perturbations().name().to_string(),
        total_duration: synth.total_duration(),
        segments: written,
    };

    let manifest_path = outdir.join(format!("{basename}{tag}.json"));
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    write_segment_table(
        &outdir.join(format!("{basename}{tag}_segments.csv")),
        &manifest.segments,
    )?;
    info!(file = %manifest_path.display(), segments = manifest.segments.len(), "run manifest written");

    Ok(manifest)
}
