//! Data sink that prints records on stdout, as text or JSON lines.

use std::io::Write;

use eyre::WrapErr;
use rgams_core::{DataSink, Detector, PeakRecord, ScanRecord, ZeroRecord};
use serde_json::{Value, json};

fn detector_code(d: Option<Detector>) -> Value {
    d.map_or(Value::Null, |d| Value::String(d.code().to_string()))
}

pub struct ConsoleSink<W: Write> {
    out: W,
    json: bool,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    /// Print one JSON object or one text line, depending on the output mode.
    pub fn emit(&mut self, obj: &Value, text: &str) -> eyre::Result<()> {
        if self.json {
            writeln!(self.out, "{obj}")
        } else {
            writeln!(self.out, "{text}")
        }
        .wrap_err("write output record")
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DataSink for ConsoleSink<W> {
    fn write_peak(&mut self, r: &PeakRecord) -> eyre::Result<()> {
        let obj = json!({
            "type": "peak",
            "instrument": r.instrument,
            "label": r.label,
            "mz": r.mz,
            "value": r.value,
            "unit": r.unit,
            "detector": detector_code(r.detector),
            "gate": r.gate,
            "timestamp": r.timestamp,
        });
        let det = r.detector.map_or('-', Detector::code);
        let text = format!(
            "{} PEAK mz={} {:.4e} {} det={det} gate={}s t={:.3}",
            r.label, r.mz, r.value, r.unit, r.gate, r.timestamp
        );
        self.emit(&obj, &text)
    }

    fn write_zero(&mut self, r: &ZeroRecord) -> eyre::Result<()> {
        let obj = json!({
            "type": "zero",
            "instrument": r.instrument,
            "label": r.label,
            "mz": r.mz,
            "mz_offset": r.mz_offset,
            "value": r.value,
            "unit": r.unit,
            "detector": detector_code(r.detector),
            "gate": r.gate,
            "timestamp": r.timestamp,
        });
        let det = r.detector.map_or('-', Detector::code);
        let text = format!(
            "{} ZERO mz={} offset={:+} {:.4e} {} det={det} gate={}s t={:.3}",
            r.label, r.mz, r.mz_offset, r.value, r.unit, r.gate, r.timestamp
        );
        self.emit(&obj, &text)
    }

    fn write_scan(&mut self, r: &ScanRecord) -> eyre::Result<()> {
        if self.json {
            let obj = json!({
                "type": "scan",
                "instrument": r.instrument,
                "label": r.label,
                "mz": r.mz,
                "intensity": r.intensity,
                "unit": r.unit,
                "detector": r.detector.code().to_string(),
                "gate": r.gate,
                "timestamp": r.timestamp,
            });
            return writeln!(self.out, "{obj}").wrap_err("write output record");
        }
        writeln!(
            self.out,
            "{} SCAN {} points det={} gate={}s t={:.3}",
            r.label,
            r.mz.len(),
            r.detector,
            r.gate,
            r.timestamp
        )
        .wrap_err("write output record")?;
        for (m, v) in r.mz.iter().zip(&r.intensity) {
            writeln!(self.out, "{m:.2}\t{v:.4e}").wrap_err("write output record")?;
        }
        Ok(())
    }
}
