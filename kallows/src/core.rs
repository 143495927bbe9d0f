//! Panel builder pipeline shared by the CLI and tests.
//! Runs every step in a fixed order and writes the panel once at the end.

use std::path::PathBuf;

use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};

use crate::geometry::{Anchor, Rect};
use crate::panel::config::PanelConfig;
use crate::panel::cuts::apply_cuts;
use crate::panel::framing::{frame_cuts, framing_substrates};
use crate::panel::layout::{read_source_area, GridPlacer, Renamer};
use crate::panel::page::{position_panel, set_page_size, set_stackup};
use crate::panel::post::{build_debug_annotation, build_postprocessing, run_user_script};
use crate::panel::preset::{production_overrides, Preset};
use crate::panel::tabs::{backbone_cuts, build_backbone, build_partition, build_tabs};
use crate::panel::tooling::{build_fiducials, build_tooling};
use crate::panel::{copperfill, text, AppendOptions, Panel, PanelError};
use crate::parser::board::Board;

/// Board gap used when a job does not set one.
pub const DEFAULT_SPACING_MM: f64 = 3.0;

/// One panelization run.
#[derive(Debug, Clone)]
pub struct PanelJob {
    pub boards: Vec<PathBuf>,
    pub output: PathBuf,
    /// Gap between neighbouring boards.
    pub spacing_mm: f64,
    /// JSON preset files, applied in order.
    pub presets: Vec<PathBuf>,
    /// `(section, key, value)` overrides applied last.
    pub overrides: Vec<(String, String, Value)>,
}

impl PanelJob {
    pub fn new(boards: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            boards,
            output: output.into(),
            spacing_mm: DEFAULT_SPACING_MM,
            presets: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// The merged preset: defaults, the production rail/tab/cut/tooling
    /// settings with the job spacing, preset files, then overrides.
    pub fn preset(&self) -> Result<Preset, PanelError> {
        let spacing = format!("{}mm", self.spacing_mm);
        let mut base = production_overrides();
        if let Some(sections) = base.as_object_mut() {
            sections.insert("layout".into(), json!({"hspace": spacing, "vspace": spacing}));
        }

        let mut preset = Preset::obtain(&[base])?;
        for path in &self.presets {
            preset.merge(&Preset::load_layer(path)?)?;
        }
        for (section, key, value) in &self.overrides {
            preset.set(section, key, value.clone())?;
        }
        Ok(preset)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct PanelSummary {
    pub output: PathBuf,
    pub substrates: Vec<Rect>,
    pub nets: usize,
    pub framing: usize,
    pub backbone: usize,
    pub tabs: usize,
    pub cuts: usize,
    pub cut_features: usize,
    pub tooling_holes: usize,
    pub fiducials: usize,
    pub texts: Vec<String>,
    pub copper_zones: usize,
    pub script_ran: bool,
    pub debug_lines: usize,
    pub outline_bbox: Option<Rect>,
}

pub struct PanelBuilder;

impl PanelBuilder {
    /// Build and save the panel described by `job`.
    ///
    /// Nothing is written unless every step succeeds.
    pub fn build(job: &PanelJob) -> Result<PanelSummary, PanelError> {
        if job.boards.is_empty() {
            return Err(PanelError::Empty);
        }

        // 1. preset
        let preset = job.preset()?;
        let config = PanelConfig::from_preset(&preset)?;
        let trace = config.debug.trace;
        tracing::info!("Preset resolved for {} boards", job.boards.len());

        // 2. boards
        let boards = job
            .boards
            .iter()
            .map(|path| Board::load(path))
            .collect::<Result<Vec<_>, _>>()?;
        let reference = &boards[0];
        tracing::info!("Loaded {} boards", boards.len());

        // 3. panel
        let mut panel = Panel::new(&job.output);
        panel.set_deterministic(config.debug.deterministic);
        panel.inherit_design_settings(reference);
        panel.inherit_properties(reference);
        panel.inherit_title_block(reference);

        // 4. source areas
        let areas = boards
            .iter()
            .map(|board| read_source_area(&config.source, board))
            .collect::<Result<Vec<_>, _>>()?;

        // 5. placement, one row
        let net_renamer = Renamer::for_nets(&config.layout.rename_net)?;
        let ref_renamer = Renamer::for_references(&config.layout.rename_ref)?;
        let placer = GridPlacer::new(config.layout.hspace, config.layout.vspace);
        let centres = placer.place(&areas, boards.len());
        for (k, ((board, area), centre)) in boards.iter().zip(&areas).zip(&centres).enumerate() {
            let options = AppendOptions {
                position: *centre,
                origin: Anchor::Center,
                source_area: *area,
                tolerance: config.source.tolerance,
                net_renamer: &net_renamer,
                ref_renamer: &ref_renamer,
                inherit_drc: k == 0,
            };
            panel.append_board(board, &options)?;
        }
        tracing::info!("Placed {} substrates", panel.substrates().len());

        // 6. framing, partition, backbone, tabs
        let board_bbox = panel
            .substrates()
            .iter()
            .map(|s| s.rect)
            .reduce(Rect::union)
            .ok_or(PanelError::Empty)?;
        let framing = framing_substrates(board_bbox, &config.framing);
        panel.add_framing(framing.iter().copied());
        let partitions = build_partition(panel.substrates(), &framing);
        panel.set_partitions(&partitions);

        let backbone = build_backbone(
            panel.substrates(),
            &framing,
            config.layout.vbackbone,
            config.layout.hbackbone,
        );
        panel.add_backbone(backbone.iter().copied());
        let mut other_cuts = backbone_cuts(
            &backbone,
            &framing,
            config.layout.vbonecut,
            config.layout.hbonecut,
        );

        let obstacles: Vec<Rect> = framing.iter().chain(&backbone).copied().collect();
        let (tabs, tab_cuts) = build_tabs(panel.substrates(), &obstacles, &config.tabs);
        for tab in &tabs {
            crate::geometry_trace!(trace, "Tab {:?}", tab);
        }
        panel.add_tabs(tabs.iter().copied());
        other_cuts.extend(frame_cuts(&framing, &config.framing));
        tracing::info!(
            "Framing: {} pieces, {} backbone strips, {} tabs",
            framing.len(),
            backbone.len(),
            tabs.len()
        );

        // 7. tooling, fiducials, text, post-processing
        let holes = build_tooling(&mut panel, &config.tooling);
        let fiducials = build_fiducials(&mut panel, &config.fiducials);
        for hole in holes.iter().chain(&fiducials) {
            crate::geometry_trace!(trace, "Corner feature at ({:.3}, {:.3})", hole.x, hole.y);
        }
        let now = Local::now();
        let texts: Vec<String> = config
            .texts
            .iter()
            .filter_map(|t| text::build_text(&mut panel, t, &now))
            .collect();
        build_postprocessing(&mut panel, &config.post);
        tracing::info!(
            "Added {} tooling holes, {} fiducials, {} texts",
            holes.len(),
            fiducials.len(),
            texts.len()
        );

        // 8. cuts
        let cuts: Vec<_> = tab_cuts.iter().chain(&other_cuts).copied().collect();
        let cut_features = apply_cuts(&mut panel, &cuts, &config.cuts, trace);
        tracing::info!("Rendered {} cuts as {} features", cuts.len(), cut_features);

        // 9. copper fill, stackup, page
        let copper_zones = copperfill::build_copperfill(&mut panel, &config.copperfill);
        set_stackup(&mut panel, config.source.stack, reference);
        let page = set_page_size(&mut panel, &config.page, reference);
        position_panel(&mut panel, &config.page, page);
        tracing::info!("Page {:.1} x {:.1} mm, {} copper zones", page.0, page.1, copper_zones);

        // 10. user script, debug
        let script_ran = run_user_script(&mut panel, &config.post)?;
        let debug_lines = build_debug_annotation(&mut panel, &config.debug);

        // 11. save
        panel.save(config.post.reconstruct_arcs, config.post.refill_zones)?;

        Ok(PanelSummary {
            output: job.output.clone(),
            substrates: panel.substrates().iter().map(|s| s.rect).collect(),
            nets: panel.nets().len(),
            framing: framing.len(),
            backbone: backbone.len(),
            tabs: tabs.len(),
            cuts: cuts.len(),
            cut_features,
            tooling_holes: holes.len(),
            fiducials: fiducials.len(),
            texts,
            copper_zones,
            script_ran,
            debug_lines,
            outline_bbox: panel.bbox(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_preset_layers() {
        let mut job = PanelJob::new(vec![PathBuf::from("a.kicad_pcb")], "out.kicad_pcb");
        job.overrides.push(("cuts".into(), "type".into(), json!("vcuts")));
        let preset = job.preset().unwrap();
        assert_eq!(preset.get("framing", "type"), Some(&json!("railslr")));
        assert_eq!(preset.get("layout", "hspace"), Some(&json!("3mm")));
        assert_eq!(preset.get("cuts", "type"), Some(&json!("vcuts")));
    }

    #[test]
    fn test_job_rejects_unknown_override() {
        let mut job = PanelJob::new(vec![PathBuf::from("a.kicad_pcb")], "out.kicad_pcb");
        job.overrides.push(("cuts".into(), "depth".into(), json!("1mm")));
        assert!(matches!(job.preset(), Err(PanelError::Preset(_))));
    }

    #[test]
    fn test_empty_job() {
        let job = PanelJob::new(Vec::new(), "out.kicad_pcb");
        assert!(matches!(PanelBuilder::build(&job), Err(PanelError::Empty)));
    }
}
