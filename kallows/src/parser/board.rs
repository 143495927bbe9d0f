//! KiCad board loader
//!
//! Reads a `.kicad_pcb` file into a [`Board`]: the document header, the
//! board-wide sections the panel inherits (setup, layers, title block,
//! properties, paper), the net table, and every remaining top-level item
//! kept as raw S-expressions so nothing the panel does not touch is lost.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::parser::sexp::{ParseError, SExp, SExpParser};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("S-expression parse error in {path}: {source}")]
    SExpParse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("Cannot read board {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid board format: {0}")]
    InvalidFormat(String),
}

/// Net id -> name table of a board or panel.
///
/// Net 0 is the unconnected net with the empty name.
#[derive(Debug, Clone, PartialEq)]
pub struct NetTable {
    nets: BTreeMap<u32, String>,
}

impl Default for NetTable {
    fn default() -> Self {
        let mut nets = BTreeMap::new();
        nets.insert(0, String::new());
        Self { nets }
    }
}

impl NetTable {
    pub fn name(&self, id: u32) -> Option<&str> {
        self.nets.get(&id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.nets
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    /// Add a net by name, reusing the id of an existing net with that name.
    pub fn insert(&mut self, name: &str) -> u32 {
        if let Some(id) = self.id_of(name) {
            return id;
        }
        let id = self.nets.keys().next_back().map_or(0, |last| last + 1);
        self.nets.insert(id, name.to_string());
        id
    }

    fn insert_with_id(&mut self, id: u32, name: String) {
        self.nets.insert(id, name);
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.nets.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.nets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    pub fn to_sexp(&self) -> Vec<SExp> {
        self.iter()
            .map(|(id, name)| SExp::node("net", vec![SExp::atom(id.to_string()), SExp::string(name)]))
            .collect()
    }
}

/// A loaded KiCad board.
#[derive(Debug, Clone)]
pub struct Board {
    pub path: PathBuf,
    /// `version`, `generator` and `generator_version` entries.
    pub header: Vec<SExp>,
    pub general: Option<SExp>,
    pub paper: Option<SExp>,
    pub title_block: Option<SExp>,
    pub layers: Option<SExp>,
    pub setup: Option<SExp>,
    pub properties: Vec<SExp>,
    pub nets: NetTable,
    pub items: Vec<SExp>,
    /// Custom design rules from a sibling `.kicad_dru` file.
    pub drc_rules: Option<String>,
}

impl Board {
    /// Load a board from disk, along with its custom rules if present.
    pub fn load(path: &Path) -> Result<Self, BoardError> {
        let content = std::fs::read_to_string(path).map_err(|source| BoardError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut board = Self::parse_str(&content, path)?;

        let rules_path = path.with_extension("kicad_dru");
        board.drc_rules = match std::fs::read_to_string(&rules_path) {
            Ok(rules) => Some(rules),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(BoardError::Io {
                    path: rules_path,
                    source,
                })
            }
        };

        tracing::debug!(
            "Loaded board {}: {} nets, {} items",
            path.display(),
            board.nets.len(),
            board.items.len()
        );
        Ok(board)
    }

    pub fn parse_str(content: &str, path: &Path) -> Result<Self, BoardError> {
        let root = SExpParser::new(content)
            .parse()
            .map_err(|source| BoardError::SExpParse {
                path: path.to_path_buf(),
                source,
            })?;

        match root.tag() {
            Some("kicad_pcb") => {}
            Some(other) => {
                return Err(BoardError::InvalidFormat(format!(
                    "Expected kicad_pcb, found {}",
                    other
                )))
            }
            None => {
                return Err(BoardError::InvalidFormat(
                    "Expected kicad_pcb root".to_string(),
                ))
            }
        }

        let mut board = Board {
            path: path.to_path_buf(),
            header: Vec::new(),
            general: None,
            paper: None,
            title_block: None,
            layers: None,
            setup: None,
            properties: Vec::new(),
            nets: NetTable::default(),
            items: Vec::new(),
            drc_rules: None,
        };

        let SExp::List(items) = root else {
            return Err(BoardError::InvalidFormat("Expected kicad_pcb root".to_string()));
        };

        for item in items.into_iter().skip(1) {
            match item.tag() {
                Some("version") | Some("generator") | Some("generator_version") => {
                    board.header.push(item)
                }
                Some("general") => board.general = Some(item),
                Some("paper") | Some("page") => board.paper = Some(item),
                Some("title_block") => board.title_block = Some(item),
                Some("layers") => board.layers = Some(item),
                Some("setup") => board.setup = Some(item),
                Some("property") => board.properties.push(item),
                Some("net") => {
                    let (id, name) = Self::parse_net(&item)?;
                    board.nets.insert_with_id(id, name);
                }
                _ => board.items.push(item),
            }
        }

        if board.version().is_none() {
            return Err(BoardError::InvalidFormat(
                "Missing version in kicad_pcb header".to_string(),
            ));
        }

        Ok(board)
    }

    fn parse_net(sexp: &SExp) -> Result<(u32, String), BoardError> {
        let list = sexp
            .as_list()
            .ok_or_else(|| BoardError::InvalidFormat("Net must be a list".to_string()))?;

        let id = list
            .get(1)
            .and_then(|v| v.as_atom())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| BoardError::InvalidFormat("Net requires a numeric id".to_string()))?;

        let name = list
            .get(2)
            .and_then(|v| v.as_atom())
            .unwrap_or("")
            .to_string();

        Ok((id, name))
    }

    pub fn version(&self) -> Option<&str> {
        self.header
            .iter()
            .find(|h| h.tag() == Some("version"))
            .and_then(|h| h.as_list())
            .and_then(|l| l.get(1))
            .and_then(|v| v.as_atom())
    }

    /// Title-block field by name: `title`, `date`, `rev`, `company`, or
    /// `comment N`.
    pub fn title_field(&self, field: &str) -> Option<&str> {
        title_block_field(self.title_block.as_ref()?, field)
    }

    /// Board thickness from the general section, in mm.
    pub fn thickness(&self) -> Option<f64> {
        self.general.as_ref()?.value_f64("thickness")
    }
}

/// Look up a title-block entry; `comment 3` selects `(comment 3 "...")`.
pub fn title_block_field<'a>(title_block: &'a SExp, field: &str) -> Option<&'a str> {
    if let Some(number) = field.strip_prefix("comment ") {
        return title_block
            .get_all("comment")
            .into_iter()
            .filter_map(|c| c.as_list())
            .find(|c| c.get(1).and_then(|n| n.as_atom()) == Some(number))
            .and_then(|c| c.get(2))
            .and_then(|v| v.as_atom());
    }
    title_block.value(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"(kicad_pcb (version 20221018) (generator pcbnew)
        (general (thickness 1.6))
        (paper "A4")
        (title_block (title "Sensor") (rev "05a") (comment 2 "second"))
        (net 0 "")
        (net 1 "GND")
        (net 2 "Net-(U1-Pad1)")
        (gr_line (start 0 0) (end 10 0) (layer "Edge.Cuts") (width 0.1))
    )"#;

    #[test]
    fn test_parse_sections() {
        let board = Board::parse_str(MINIMAL, Path::new("mem.kicad_pcb")).unwrap();
        assert_eq!(board.version(), Some("20221018"));
        assert_eq!(board.thickness(), Some(1.6));
        assert_eq!(board.nets.len(), 3);
        assert_eq!(board.nets.name(2), Some("Net-(U1-Pad1)"));
        assert_eq!(board.items.len(), 1);
        assert_eq!(board.title_field("rev"), Some("05a"));
        assert_eq!(board.title_field("comment 2"), Some("second"));
        assert_eq!(board.title_field("comment 1"), None);
    }

    #[test]
    fn test_rejects_other_roots() {
        let err = Board::parse_str("(kicad_sch (version 1))", Path::new("x")).unwrap_err();
        assert!(matches!(err, BoardError::InvalidFormat(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Board::load(Path::new("does/not/exist.kicad_pcb")).unwrap_err();
        assert!(matches!(err, BoardError::Io { .. }));
    }

    #[test]
    fn test_load_reads_sibling_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.kicad_pcb");
        std::fs::write(&path, MINIMAL).unwrap();

        assert_eq!(Board::load(&path).unwrap().drc_rules, None);

        std::fs::write(dir.path().join("sensor.kicad_dru"), "(version 1)").unwrap();
        assert_eq!(Board::load(&path).unwrap().drc_rules.as_deref(), Some("(version 1)"));
    }

    #[test]
    fn test_unreadable_rules_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensor.kicad_pcb");
        std::fs::write(&path, MINIMAL).unwrap();
        let rules = dir.path().join("sensor.kicad_dru");
        std::fs::create_dir(&rules).unwrap();

        match Board::load(&path) {
            Err(BoardError::Io { path, .. }) => assert_eq!(path, rules),
            other => panic!("expected an I/O error, got {:?}", other.map(|b| b.path)),
        }
    }

    #[test]
    fn test_net_table_insert_reuses_names() {
        let mut nets = NetTable::default();
        let a = nets.insert("Board_1-GND");
        let b = nets.insert("Board_2-GND");
        assert_eq!((a, b), (1, 2));
        assert_eq!(nets.insert("Board_1-GND"), 1);
        assert_eq!(nets.id_of(""), Some(0));
    }
}
