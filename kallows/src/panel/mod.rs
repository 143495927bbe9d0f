//! Panel document
//!
//! A [`Panel`] accumulates placed board copies (substrates) together with
//! the geometry built around them: rails, backbones, tabs, cut features,
//! tooling, text and copper fill. It is serialized once, by [`Panel::save`].
//!
//! Substrates, rails, backbones and tabs are kept as rectangles; the board
//! outline on `Edge.Cuts` is the boundary of their union and is generated
//! when the document is written.

pub mod config;
pub mod copperfill;
pub mod cuts;
pub mod framing;
pub mod layout;
pub mod page;
pub mod post;
pub mod preset;
pub mod tabs;
pub mod text;
pub mod tooling;

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{item_bbox, translate_item, union_outline, xy_node, Anchor, Point, Rect, Segment};
use crate::panel::copperfill::CopperZone;
use crate::panel::layout::{is_outline_item, Renamer};
use crate::panel::preset::PresetError;
use crate::parser::board::{Board, BoardError, NetTable};
use crate::parser::sexp::SExp;

/// Board file format version written when no board is newer.
const DEFAULT_VERSION: &str = "20221018";

#[derive(Debug, Error)]
pub enum PanelError {
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Preset(#[from] PresetError),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Board {0} has no Edge.Cuts outline to take the source area from")]
    NoOutline(PathBuf),
    #[error("Panel has no substrates")]
    Empty,
    #[error("User script {script} failed: {message}")]
    Script { script: String, message: String },
}

impl PanelError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        PanelError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Produces UUIDs for generated and copied items.
///
/// In deterministic mode the sequence depends only on the call order, so
/// identical runs write identical files.
#[derive(Debug, Clone, Default)]
pub struct UuidSource {
    deterministic: bool,
    counter: u64,
}

impl UuidSource {
    pub fn next(&mut self) -> String {
        if self.deterministic {
            self.counter += 1;
            let name = format!("kallows-panel-{}", self.counter);
            Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
        } else {
            Uuid::new_v4().to_string()
        }
    }
}

/// One placed copy of a board.
#[derive(Debug, Clone, PartialEq)]
pub struct Substrate {
    /// 1-based placement order.
    pub index: usize,
    pub source: PathBuf,
    pub rect: Rect,
    /// Region owned by this substrate, reaching halfway to its neighbours.
    pub partition: Rect,
}

/// How [`Panel::append_board`] copies a board.
#[derive(Debug, Clone)]
pub struct AppendOptions<'a> {
    /// Where `origin` of the source area lands in the panel.
    pub position: Point,
    pub origin: Anchor,
    pub source_area: Rect,
    /// Enlarges the source area when deciding which items to copy.
    pub tolerance: f64,
    pub net_renamer: &'a Renamer,
    pub ref_renamer: &'a Renamer,
    pub inherit_drc: bool,
}

#[derive(Debug, Clone)]
pub struct Panel {
    output: PathBuf,
    header: Vec<SExp>,
    general: Option<SExp>,
    paper: SExp,
    title_block: Option<SExp>,
    layers: Option<SExp>,
    setup: Option<SExp>,
    properties: Vec<SExp>,
    nets: NetTable,
    items: Vec<SExp>,
    substrates: Vec<Substrate>,
    framing: Vec<Rect>,
    backbone: Vec<Rect>,
    tabs: Vec<Rect>,
    copper_zones: Vec<CopperZone>,
    edge_width: f64,
    outline_baked: bool,
    drc_rules: Option<String>,
    uuids: UuidSource,
}

impl Panel {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            header: vec![
                SExp::node("version", vec![SExp::atom(DEFAULT_VERSION)]),
                SExp::node("generator", vec![SExp::string("kallows")]),
            ],
            general: None,
            paper: SExp::node("paper", vec![SExp::string("A4")]),
            title_block: None,
            layers: None,
            setup: None,
            properties: Vec::new(),
            nets: NetTable::default(),
            items: Vec::new(),
            substrates: Vec::new(),
            framing: Vec::new(),
            backbone: Vec::new(),
            tabs: Vec::new(),
            copper_zones: Vec::new(),
            edge_width: 0.1,
            outline_baked: false,
            drc_rules: None,
            uuids: UuidSource::default(),
        }
    }

    pub fn set_deterministic(&mut self, deterministic: bool) {
        self.uuids.deterministic = deterministic;
    }

    pub(crate) fn new_uuid(&mut self) -> String {
        self.uuids.next()
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Take over design rules and board thickness. The stackup is set
    /// separately once all boards are placed.
    pub fn inherit_design_settings(&mut self, board: &Board) {
        self.setup = board.setup.clone().map(|mut setup| {
            setup.remove_children("stackup");
            setup
        });
        self.general = board.general.clone();
    }

    pub fn inherit_properties(&mut self, board: &Board) {
        self.properties = board.properties.clone();
    }

    pub fn inherit_title_block(&mut self, board: &Board) {
        self.title_block = board.title_block.clone();
    }

    pub fn title_block(&self) -> Option<&SExp> {
        self.title_block.as_ref()
    }

    pub fn substrates(&self) -> &[Substrate] {
        &self.substrates
    }

    pub fn nets(&self) -> &NetTable {
        &self.nets
    }

    pub fn items(&self) -> &[SExp] {
        &self.items
    }

    pub fn framing(&self) -> &[Rect] {
        &self.framing
    }

    pub fn backbone(&self) -> &[Rect] {
        &self.backbone
    }

    pub fn tabs(&self) -> &[Rect] {
        &self.tabs
    }

    pub fn copper_zones(&self) -> &[CopperZone] {
        &self.copper_zones
    }

    /// Copy a board into the panel as a new substrate.
    ///
    /// Items outside the (tolerance-enlarged) source area are left behind.
    /// The board's outline is replaced by the panel outline; outline
    /// drawings strictly inside the area are kept as cut-outs. Nets and
    /// references are renamed, net ids renumbered into the panel's table,
    /// and item UUIDs regenerated so repeated boards stay unique.
    pub fn append_board(&mut self, board: &Board, options: &AppendOptions) -> Result<Rect, PanelError> {
        let index = self.substrates.len() + 1;
        let area = options.source_area;
        let inclusion = area.inflate(options.tolerance, options.tolerance);
        let anchor = area.anchor(options.origin);
        let (dx, dy) = (options.position.x - anchor.x, options.position.y - anchor.y);

        let mut net_ids: HashMap<u32, (u32, String)> = HashMap::new();
        let mut net_names: HashMap<String, String> = HashMap::new();
        for (id, name) in board.nets.iter() {
            if id == 0 || name.is_empty() {
                net_ids.insert(id, (0, String::new()));
                continue;
            }
            let renamed = options.net_renamer.rename(index, name);
            let new_id = self.nets.insert(&renamed);
            net_ids.insert(id, (new_id, renamed.clone()));
            net_names.insert(name.to_string(), renamed);
        }

        let mut copied = Vec::new();
        let mut skipped = 0usize;
        let mut shared = 0usize;
        for item in &board.items {
            let bbox = item_bbox(item);
            if is_outline_item(item) {
                match bbox {
                    Some(b) if area.strictly_contains_rect(&b) => {}
                    _ => continue,
                }
            }
            match bbox {
                Some(b) if !inclusion.contains_rect(&b) => {
                    skipped += 1;
                    continue;
                }
                None if item.tag() != Some("group") && !self.substrates.is_empty() => {
                    shared += 1;
                    continue;
                }
                _ => {}
            }
            copied.push(item.clone());
        }
        if skipped > 0 {
            tracing::debug!(
                "Board {}: {} items outside the source area were not copied",
                index,
                skipped
            );
        }
        if shared > 0 {
            tracing::debug!(
                "Board {}: {} board-wide items already taken from board 1",
                index,
                shared
            );
        }

        let mut uuid_map = HashMap::new();
        for item in &mut copied {
            rename_nets(item, &net_ids, &net_names, options.net_renamer, index);
            rename_reference(item, options.ref_renamer, index);
            self.assign_uuids(item, &mut uuid_map);
            translate_item(item, dx, dy);
        }
        for item in &mut copied {
            remap_group_members(item, &uuid_map);
        }
        self.items.extend(copied);

        if let Some(version) = board.version() {
            self.raise_version(version);
        }
        if options.inherit_drc {
            if let Some(rules) = &board.drc_rules {
                self.drc_rules = Some(rules.clone());
            }
        }

        let placed = area.translate(dx, dy);
        self.substrates.push(Substrate {
            index,
            source: board.path.clone(),
            rect: placed,
            partition: placed,
        });
        tracing::debug!(
            "Placed board {} ({}) at ({:.3}, {:.3})-({:.3}, {:.3})",
            index,
            board.path.display(),
            placed.min.x,
            placed.min.y,
            placed.max.x,
            placed.max.y
        );
        Ok(placed)
    }

    fn raise_version(&mut self, version: &str) {
        let Some(slot) = self.header.iter_mut().find(|h| h.tag() == Some("version")) else {
            return;
        };
        let current = slot.value("version").and_then(|v| v.parse::<u64>().ok());
        let candidate = version.parse::<u64>().ok();
        if let (Some(current), Some(candidate)) = (current, candidate) {
            if candidate > current {
                *slot = SExp::node("version", vec![SExp::atom(version)]);
            }
        }
    }

    fn assign_uuids(&mut self, sexp: &mut SExp, map: &mut HashMap<String, String>) {
        let Some(list) = sexp.as_list_mut() else {
            return;
        };
        let is_id = matches!(
            list.first().and_then(SExp::as_atom),
            Some("uuid") | Some("tstamp")
        );
        if is_id {
            if let Some(old) = list.get(1).and_then(SExp::as_atom).map(str::to_string) {
                let fresh = map.entry(old).or_insert_with(|| self.uuids.next()).clone();
                list[1] = SExp::string(fresh);
            }
            return;
        }
        for child in list.iter_mut().skip(1) {
            self.assign_uuids(child, map);
        }
    }

    pub fn set_partitions(&mut self, partitions: &[Rect]) {
        for (substrate, partition) in self.substrates.iter_mut().zip(partitions) {
            substrate.partition = *partition;
        }
    }

    pub fn add_item(&mut self, item: SExp) {
        self.items.push(item);
    }

    pub fn add_framing(&mut self, rects: impl IntoIterator<Item = Rect>) {
        self.framing.extend(rects);
    }

    pub fn add_backbone(&mut self, rects: impl IntoIterator<Item = Rect>) {
        self.backbone.extend(rects);
    }

    pub fn add_tabs(&mut self, rects: impl IntoIterator<Item = Rect>) {
        self.tabs.extend(rects);
    }

    pub fn add_copper_zone(&mut self, zone: CopperZone) {
        self.copper_zones.push(zone);
    }

    pub fn set_edge_width(&mut self, width: f64) {
        self.edge_width = width;
    }

    /// Bounding box of all panel material.
    pub fn bbox(&self) -> Option<Rect> {
        self.substrates
            .iter()
            .map(|s| s.rect)
            .chain(self.framing.iter().copied())
            .chain(self.backbone.iter().copied())
            .chain(self.tabs.iter().copied())
            .reduce(Rect::union)
    }

    /// Move everything in the panel by (dx, dy).
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for item in &mut self.items {
            translate_item(item, dx, dy);
        }
        for substrate in &mut self.substrates {
            substrate.rect = substrate.rect.translate(dx, dy);
            substrate.partition = substrate.partition.translate(dx, dy);
        }
        for rect in self
            .framing
            .iter_mut()
            .chain(self.backbone.iter_mut())
            .chain(self.tabs.iter_mut())
        {
            *rect = rect.translate(dx, dy);
        }
        for zone in &mut self.copper_zones {
            zone.rect = zone.rect.translate(dx, dy);
        }
        if let Some(setup) = &mut self.setup {
            for key in ["aux_axis_origin", "grid_origin"] {
                if let Some(origin) = setup.child_mut(key) {
                    if let Some(list) = origin.as_list_mut() {
                        let x = list.get(1).and_then(SExp::as_f64);
                        let y = list.get(2).and_then(SExp::as_f64);
                        if let (Some(x), Some(y)) = (x, y) {
                            list[1] = SExp::number(x + dx);
                            list[2] = SExp::number(y + dy);
                        }
                    }
                }
            }
        }
    }

    pub fn paper(&self) -> &SExp {
        &self.paper
    }

    pub fn set_paper(&mut self, paper: SExp) {
        self.paper = paper;
    }

    pub fn layers(&self) -> Option<&SExp> {
        self.layers.as_ref()
    }

    pub fn set_layers(&mut self, layers: Option<SExp>) {
        self.layers = layers;
    }

    /// Replace the stackup description inside the setup section.
    pub fn set_stackup(&mut self, stackup: Option<SExp>) {
        let setup = self
            .setup
            .get_or_insert_with(|| SExp::node("setup", Vec::new()));
        setup.remove_children("stackup");
        if let Some(stackup) = stackup {
            if let Some(items) = setup.as_list_mut() {
                items.insert(1, stackup);
            }
        }
    }

    pub fn setup(&self) -> Option<&SExp> {
        self.setup.as_ref()
    }

    pub fn set_aux_origin(&mut self, origin: Point) {
        let setup = self
            .setup
            .get_or_insert_with(|| SExp::node("setup", Vec::new()));
        setup.set_child(
            "aux_axis_origin",
            vec![SExp::number(origin.x), SExp::number(origin.y)],
        );
    }

    /// Edge.Cuts segments of the panel outline.
    pub fn outline(&self) -> Vec<Segment> {
        let rects: Vec<Rect> = self
            .substrates
            .iter()
            .map(|s| s.rect)
            .chain(self.framing.iter().copied())
            .chain(self.backbone.iter().copied())
            .chain(self.tabs.iter().copied())
            .collect();
        union_outline(&rects)
    }

    /// Assemble the complete `kicad_pcb` document.
    pub fn to_document(&mut self, refill_zones: bool) -> SExp {
        let mut root = vec![SExp::atom("kicad_pcb")];
        root.extend(self.header.iter().cloned());
        root.extend(self.general.iter().cloned());
        root.push(self.paper.clone());
        root.extend(self.title_block.iter().cloned());
        root.extend(self.layers.iter().cloned());
        root.extend(self.setup.iter().cloned());
        root.extend(self.properties.iter().cloned());
        root.extend(self.nets.to_sexp());
        root.extend(self.items.iter().cloned());

        if !self.outline_baked {
            for segment in self.outline() {
                let uuid = self.new_uuid();
                root.push(SExp::node(
                    "gr_line",
                    vec![
                        xy_node("start", segment.start),
                        xy_node("end", segment.end),
                        SExp::node(
                            "stroke",
                            vec![
                                SExp::node("width", vec![SExp::number(self.edge_width)]),
                                SExp::node("type", vec![SExp::atom("solid")]),
                            ],
                        ),
                        SExp::node("layer", vec![SExp::string("Edge.Cuts")]),
                        SExp::node("uuid", vec![SExp::string(uuid)]),
                    ],
                ));
            }
            let zones = self.copper_zones.clone();
            for zone in zones {
                let uuid = self.new_uuid();
                root.push(zone.to_sexp(uuid, refill_zones));
            }
        }

        SExp::List(root)
    }

    /// Write the panel file, and its custom rules when inherited.
    ///
    /// The file is written to a temporary sibling first and moved into
    /// place, so a failed write never leaves a partial panel behind.
    pub fn save(&mut self, reconstruct_arcs: bool, refill_zones: bool) -> Result<(), PanelError> {
        if self.substrates.is_empty() {
            return Err(PanelError::Empty);
        }
        if reconstruct_arcs {
            tracing::debug!("Arc reconstruction requested; panel outline contains no approximated arcs");
        }

        let document = self.to_document(refill_zones).to_pretty_string();
        let output = self.output.clone();
        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| PanelError::io(&dir, e))?;

        let mut staged = tempfile::NamedTempFile::new_in(&dir).map_err(|e| PanelError::io(&dir, e))?;
        staged
            .write_all(document.as_bytes())
            .map_err(|e| PanelError::io(&output, e))?;
        staged
            .persist(&output)
            .map_err(|e| PanelError::io(&output, e.error))?;

        if let Some(rules) = &self.drc_rules {
            let rules_path = output.with_extension("kicad_dru");
            std::fs::write(&rules_path, rules).map_err(|e| PanelError::io(&rules_path, e))?;
        }

        tracing::info!(
            "Saved panel {} ({} substrates, {} nets)",
            output.display(),
            self.substrates.len(),
            self.nets.len()
        );
        Ok(())
    }

    /// Replace the document content with a board read back from disk,
    /// keeping substrate geometry for later annotation.
    pub fn reload(&mut self, board: Board) {
        self.header = board.header;
        self.general = board.general;
        if let Some(paper) = board.paper {
            self.paper = paper;
        }
        self.title_block = board.title_block;
        self.layers = board.layers;
        self.setup = board.setup;
        self.properties = board.properties;
        self.nets = board.nets;
        self.items = board.items;
        self.copper_zones.clear();
        self.outline_baked = true;
    }
}

fn rename_nets(
    sexp: &mut SExp,
    ids: &HashMap<u32, (u32, String)>,
    names: &HashMap<String, String>,
    renamer: &Renamer,
    index: usize,
) {
    let tag = sexp.tag().map(str::to_string);
    let Some(list) = sexp.as_list_mut() else {
        return;
    };
    match tag.as_deref() {
        Some("net") if list.len() >= 2 => {
            let numeric = list[1].as_atom().and_then(|s| s.parse::<u32>().ok());
            match numeric {
                Some(old) => {
                    if let Some((new_id, new_name)) = ids.get(&old) {
                        list[1] = SExp::atom(new_id.to_string());
                        if list.len() >= 3 {
                            list[2] = SExp::string(new_name.clone());
                        }
                    }
                }
                None => {
                    let old = list[1].as_atom().unwrap_or("").to_string();
                    if !old.is_empty() {
                        list[1] = SExp::string(renamer.rename(index, &old));
                    }
                }
            }
        }
        Some("net_name") if list.len() >= 2 => {
            let old = list[1].as_atom().unwrap_or("").to_string();
            if let Some(new_name) = names.get(&old) {
                list[1] = SExp::string(new_name.clone());
            }
        }
        _ => {
            for child in list.iter_mut().skip(1) {
                rename_nets(child, ids, names, renamer, index);
            }
        }
    }
}

fn rename_reference(item: &mut SExp, renamer: &Renamer, index: usize) {
    if !matches!(item.tag(), Some("footprint") | Some("module")) {
        return;
    }
    let Some(list) = item.as_list_mut() else {
        return;
    };
    for child in list.iter_mut() {
        let is_reference = match child.as_list() {
            Some(c) => matches!(
                (c.first().and_then(SExp::as_atom), c.get(1).and_then(SExp::as_atom)),
                (Some("property"), Some("Reference")) | (Some("fp_text"), Some("reference"))
            ),
            None => false,
        };
        if !is_reference {
            continue;
        }
        if let Some(fields) = child.as_list_mut() {
            if let Some(orig) = fields.get(2).and_then(SExp::as_atom).map(str::to_string) {
                fields[2] = SExp::string(renamer.rename(index, &orig));
            }
        }
    }
}

fn remap_group_members(sexp: &mut SExp, map: &HashMap<String, String>) {
    let Some(list) = sexp.as_list_mut() else {
        return;
    };
    if list.first().and_then(SExp::as_atom) == Some("members") {
        let mut members = vec![SExp::atom("members")];
        members.extend(
            list.iter()
                .skip(1)
                .filter_map(SExp::as_atom)
                .filter_map(|old| map.get(old))
                .map(|new| SExp::string(new.clone())),
        );
        *list = members;
        return;
    }
    for child in list.iter_mut().skip(1) {
        remap_group_members(child, map);
    }
}
