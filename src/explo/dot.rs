//! Graphviz output of the explored states.

use crate::error::McError;
use crate::transition::Transition;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const HEADER: &str = "digraph graphname{\n fixedsize=true; rankdir=TB; ranksep=.25; edge [fontsize=12]; node [fontsize=10, shape=circle,width=.5 ]; graph [fontsize=10];\n";

/// One edge per executed transition, between state numbers.
pub struct DotWriter {
    out: BufWriter<File>,
    closed: bool,
}

impl DotWriter {
    pub fn create(path: &Path) -> Result<Self, McError> {
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(HEADER.as_bytes())?;
        Ok(DotWriter { out, closed: false })
    }

    pub fn edge(&mut self, parent: u64, child: u64, t: &Transition) -> Result<(), McError> {
        writeln!(self.out, "\"{}\" -> \"{}\" [{}];", parent, child, t.dot_string())?;
        Ok(())
    }

    /// Terminates the graph. Later calls do nothing.
    pub fn close(&mut self) -> Result<(), McError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.out.write_all(b"}\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{Aid, TransitionKind};

    #[test]
    fn test_graph_is_closed_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.dot");
        let mut dot = DotWriter::create(&path).unwrap();
        dot.edge(0, 1, &Transition::new(Aid(1), 0, TransitionKind::Unknown))
            .unwrap();
        dot.close().unwrap();
        dot.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("digraph graphname{"));
        assert!(content.contains("\"0\" -> \"1\" [label = \"[(1)] UNKNOWN\""));
        assert!(content.ends_with("}\n"));
        assert_eq!(content.matches('}').count(), 1);
    }
}
