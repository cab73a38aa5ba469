//! Room and authoring-map validation.
//!
//! Validation never mutates a document. Errors fail a document; warnings are
//! reported but never fail it.

use crate::csv::{self, GridIssue};
use crate::room::{RoomDocument, RoomLayer, RoomTileData};
use crate::tmx::{Layer, MapDocument};
use std::fmt;

/// Every room uses 32x32 tiles.
pub const CANONICAL_TILE_SIZE: u32 = 32;
/// Tile-definition resource every room should reference.
pub const CANONICAL_TILESET: &str = "dunjon_tileset.tsx";

/// Layer kinds named by the required-layer rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Tiles,
    Objects,
}

/// Layers every room is expected to carry.
pub const REQUIRED_LAYERS: [(LayerKind, &str); 4] = [
    (LayerKind::Tiles, "Ground"),
    (LayerKind::Tiles, "Collision"),
    (LayerKind::Objects, "Entities"),
    (LayerKind::Objects, "Metadata"),
];

/// A single validation finding.
#[derive(Debug, Clone, PartialEq)]
pub enum Issue {
    MissingTileSize,
    WrongTileSize { width: u32, height: u32 },
    NoTilesets,
    TilesetMissingSource { firstgid: u32 },
    NonCanonicalTileset { source: String },
    NoLayers,
    MissingLayer { kind: LayerKind, name: &'static str },
    ObjectSize { name: String, width: f64, height: f64 },
    Grid { layer: String, issue: GridIssue },
    MissingAttribute { name: &'static str },
    NoTileLayers,
    LayerMissingName { index: usize },
    LayerMissingData { name: String },
    UnterminatedCsvLine { layer: String, line: usize, content: String },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::MissingTileSize => write!(f, "Missing tile dimensions"),
            Issue::WrongTileSize { width, height } => write!(
                f,
                "Wrong tile size: {width}x{height} (should be {CANONICAL_TILE_SIZE}x{CANONICAL_TILE_SIZE})"
            ),
            Issue::NoTilesets => write!(f, "No tilesets defined"),
            Issue::TilesetMissingSource { firstgid } => {
                write!(f, "Tileset (firstgid {firstgid}) missing source")
            }
            Issue::NonCanonicalTileset { source } => {
                write!(f, "Tileset source: {source} (should be {CANONICAL_TILESET})")
            }
            Issue::NoLayers => write!(f, "No layers defined"),
            Issue::MissingLayer { name, .. } => write!(f, "Missing {name} layer"),
            Issue::ObjectSize {
                name,
                width,
                height,
            } => {
                let name = if name.is_empty() { "unnamed" } else { name };
                write!(
                    f,
                    "Object {name} size: {width}x{height} (should be {CANONICAL_TILE_SIZE}x{CANONICAL_TILE_SIZE})"
                )
            }
            Issue::Grid { layer, issue } => write!(f, "Layer {layer}: {issue}"),
            Issue::MissingAttribute { name } => write!(f, "Missing required attribute: {name}"),
            Issue::NoTileLayers => write!(f, "No layers found"),
            Issue::LayerMissingName { index } => write!(f, "Layer #{index} missing name attribute"),
            Issue::LayerMissingData { name } => write!(f, "Layer {name} missing data element"),
            Issue::UnterminatedCsvLine {
                layer,
                line,
                content,
            } => {
                let head: String = content.chars().take(20).collect();
                write!(f, "Layer {layer}: line {line} doesn't end with comma: {head}...")
            }
        }
    }
}

/// Ordered errors and warnings for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

impl ValidationReport {
    /// True when no errors were found. Warnings never fail a document.
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Optional extra strictness.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorOptions {
    /// Decode CSV grids and check them against the layer size (errors).
    pub strict_grid: bool,
}

/// Validate a room with the default rule set.
pub fn validate_room(room: &RoomDocument) -> ValidationReport {
    validate_room_with(room, ValidatorOptions::default())
}

/// Validate a room.
pub fn validate_room_with(room: &RoomDocument, opts: ValidatorOptions) -> ValidationReport {
    let mut report = ValidationReport::default();

    match (room.tilewidth, room.tileheight) {
        (Some(w), Some(h)) if w == CANONICAL_TILE_SIZE && h == CANONICAL_TILE_SIZE => {}
        (Some(width), Some(height)) => report.errors.push(Issue::WrongTileSize { width, height }),
        _ => report.errors.push(Issue::MissingTileSize),
    }

    if room.tilesets.is_empty() {
        report.errors.push(Issue::NoTilesets);
    }
    for ts in &room.tilesets {
        match &ts.source {
            None => report.errors.push(Issue::TilesetMissingSource {
                firstgid: ts.firstgid,
            }),
            Some(source) if !source.ends_with(CANONICAL_TILESET) => {
                report.warnings.push(Issue::NonCanonicalTileset {
                    source: source.clone(),
                })
            }
            Some(_) => {}
        }
    }

    if room.layers.is_empty() {
        report.errors.push(Issue::NoLayers);
    }
    for (kind, name) in REQUIRED_LAYERS {
        let present = room.layers.iter().any(|l| match (l, kind) {
            (RoomLayer::Tiles(t), LayerKind::Tiles) => t.name == name,
            (RoomLayer::Objects(g), LayerKind::Objects) => g.name == name,
            _ => false,
        });
        if !present {
            report.warnings.push(Issue::MissingLayer { kind, name });
        }
    }

    for layer in &room.layers {
        if let RoomLayer::Objects(g) = layer {
            for obj in &g.objects {
                let canonical = CANONICAL_TILE_SIZE as f64;
                if obj.width != canonical || obj.height != canonical {
                    report.warnings.push(Issue::ObjectSize {
                        name: obj.name.clone(),
                        width: obj.width,
                        height: obj.height,
                    });
                }
            }
        }
    }

    if opts.strict_grid {
        check_room_grids(room, &mut report);
    }

    report
}

fn check_room_grids(room: &RoomDocument, report: &mut ValidationReport) {
    for layer in &room.layers {
        let RoomLayer::Tiles(t) = layer else {
            continue;
        };
        let width = t.width.or(room.width).unwrap_or(0) as usize;
        let height = t.height.or(room.height).unwrap_or(0) as usize;
        let issues = match &t.data {
            RoomTileData::Csv(text) => csv::check_grid(text, width, height),
            RoomTileData::Gids(gids) if gids.len() != width * height => {
                vec![GridIssue::CellCount {
                    found: gids.len(),
                    expected: width * height,
                }]
            }
            RoomTileData::Gids(_) => Vec::new(),
        };
        report
            .errors
            .extend(issues.into_iter().map(|issue| Issue::Grid {
                layer: t.name.clone(),
                issue,
            }));
    }
}

/// Check that an authoring map has what the authoring tool needs to open it.
pub fn validate_map(map: &MapDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    let required = [
        ("version", map.version.is_some()),
        ("width", map.width.is_some()),
        ("height", map.height.is_some()),
        ("tilewidth", map.tile_width.is_some()),
        ("tileheight", map.tile_height.is_some()),
    ];
    for (name, present) in required {
        if !present {
            report.errors.push(Issue::MissingAttribute { name });
        }
    }

    if map.tilesets.is_empty() {
        report.errors.push(Issue::NoTilesets);
    }
    for ts in map.tilesets.iter().filter(|ts| ts.source.is_none()) {
        report.errors.push(Issue::TilesetMissingSource {
            firstgid: ts.first_gid,
        });
    }

    let tile_layers: Vec<_> = map
        .layers
        .iter()
        .filter_map(|l| match l {
            Layer::Tiles(t) => Some(t),
            Layer::Objects(_) => None,
        })
        .collect();
    if tile_layers.is_empty() {
        report.errors.push(Issue::NoTileLayers);
    }

    for (index, layer) in tile_layers.into_iter().enumerate() {
        let Some(name) = layer.name.clone() else {
            report.errors.push(Issue::LayerMissingName { index });
            continue;
        };
        let Some(data) = &layer.data else {
            report.errors.push(Issue::LayerMissingData { name });
            continue;
        };
        if data.encoding.as_deref() == Some("csv") {
            for bad in csv::check_line_endings(&data.text) {
                report.warnings.push(Issue::UnterminatedCsvLine {
                    layer: name.clone(),
                    line: bad.line,
                    content: bad.content,
                });
            }
        }
    }

    report
}
