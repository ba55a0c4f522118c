// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CSV export of extracted triples

use crate::error::{IngestError, IngestResult};
use annalist_core::Triple;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Header row, one column per triple field
pub const CSV_HEADER: [&str; 6] = [
    "head_entity",
    "head_entity_label",
    "relation",
    "tail_entity",
    "tail_entity_label",
    "context",
];

/// Quote a field when it contains a delimiter, quote or line break
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn write_row<W: Write>(out: &mut W, fields: &[&str]) -> std::io::Result<()> {
    let line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")
}

/// Write the header and one row per triple to `out`
pub fn write_triples<W: Write>(out: &mut W, triples: &[Triple]) -> std::io::Result<()> {
    write_row(out, &CSV_HEADER)?;
    for t in triples {
        write_row(
            out,
            &[
                t.head.as_str(),
                t.head_type.as_str(),
                t.relation.as_str(),
                t.tail.as_str(),
                t.tail_type.as_str(),
                t.context.as_str(),
            ],
        )?;
    }
    out.flush()
}

/// Write triples to a CSV file, creating parent directories as needed
pub fn export_csv(path: &Path, triples: &[Triple]) -> IngestResult<()> {
    let to_write_error = |source| IngestError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_write_error)?;
    }
    let file = File::create(path).map_err(to_write_error)?;
    write_triples(&mut BufWriter::new(file), triples).map_err(to_write_error)?;

    info!(path = %path.display(), rows = triples.len(), "Triples exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("甲"), "甲");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_write_triples() {
        let triples = vec![
            Triple::new("甲", "PER", "父母", "乙", "PER", "甲之父乙也"),
            Triple::new("丙", "", "到达", "长安", "LOC", "至长安, 留三日"),
        ];
        let mut out = Vec::new();
        write_triples(&mut out, &triples).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "head_entity,head_entity_label,relation,tail_entity,tail_entity_label,context"
        );
        assert_eq!(lines[1], "甲,PER,父母,乙,PER,甲之父乙也");
        assert_eq!(lines[2], "丙,,到达,长安,LOC,\"至长安, 留三日\"");
        assert_eq!(lines.len(), 3);
    }
}
