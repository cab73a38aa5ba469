//! Schema translation between authoring maps and runtime rooms.
//!
//! Both directions number layers 1, 2, 3... in declaration order with one
//! counter shared by tile layers and object groups. The engine looks layers
//! up by that id.

use crate::csv;
use crate::error::MapError;
use crate::room::*;
use crate::tmx::*;
use tracing::{debug, warn};

/// Tileset path prefix the runtime rooms use relative to the rooms directory.
pub const RUNTIME_TILESET_PREFIX: &str = "../tiles/";

fn required<T>(value: Option<T>, key: &str) -> Result<T, MapError> {
    value.ok_or_else(|| MapError::MalformedInput(format!("missing required attribute '{key}'")))
}

/// Build a runtime room from an authoring map.
///
/// CSV data is copied verbatim after trimming; it is not repaired in this
/// direction.
pub fn map_to_room(map: &MapDocument) -> Result<RoomDocument, MapError> {
    let width = required(map.width, "width")?;
    let height = required(map.height, "height")?;
    let tile_width = required(map.tile_width, "tilewidth")?;
    let tile_height = required(map.tile_height, "tileheight")?;

    let tilesets = map
        .tilesets
        .iter()
        .map(|ts| RoomTileset {
            firstgid: ts.first_gid,
            source: ts.source.clone(),
            extra: JsonMap::new(),
        })
        .collect();

    let mut layers = Vec::with_capacity(map.layers.len());
    let mut layer_id = 1u32;
    let mut max_object_id = 0u32;

    for layer in &map.layers {
        match layer {
            Layer::Tiles(l) => {
                let text = match &l.data {
                    Some(data) => {
                        if let Some(enc) = data.encoding.as_deref().filter(|e| *e != "csv") {
                            warn!(layer = l.name.as_deref(), encoding = enc, "tile data is not CSV; copied as-is");
                        }
                        data.text.trim().to_owned()
                    }
                    None => String::new(),
                };
                debug!(id = layer_id, name = l.name.as_deref(), "tile layer");
                layers.push(RoomLayer::Tiles(RoomTileLayer::new(
                    layer_id,
                    l.name.clone().unwrap_or_default(),
                    l.width.unwrap_or(width),
                    l.height.unwrap_or(height),
                    text,
                )));
            }
            Layer::Objects(g) => {
                debug!(id = layer_id, name = %g.name, objects = g.objects.len(), "object group");
                let objects = g
                    .objects
                    .iter()
                    .map(|o| {
                        max_object_id = max_object_id.max(o.id);
                        object_to_room(o)
                    })
                    .collect();
                layers.push(RoomLayer::Objects(RoomObjectGroup {
                    draworder: g
                        .draw_order
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DRAW_ORDER.to_owned()),
                    id: Some(layer_id),
                    name: g.name.clone(),
                    objects,
                    opacity: 1.0,
                    visible: true,
                    x: 0,
                    y: 0,
                    extra: JsonMap::new(),
                }));
            }
        }
        layer_id += 1;
    }

    Ok(RoomDocument {
        height: Some(height),
        infinite: map.infinite,
        layers,
        nextlayerid: Some(map.next_layer_id.unwrap_or(layer_id)),
        nextobjectid: Some(map.next_object_id.unwrap_or(max_object_id + 1)),
        orientation: map
            .orientation
            .clone()
            .unwrap_or_else(|| DEFAULT_ORIENTATION.to_owned()),
        renderorder: map
            .render_order
            .clone()
            .unwrap_or_else(|| DEFAULT_RENDER_ORDER.to_owned()),
        tileheight: Some(tile_height),
        tilesets,
        tilewidth: Some(tile_width),
        width: Some(width),
        ..RoomDocument::default()
    })
}

fn object_to_room(o: &MapObject) -> RoomObject {
    RoomObject {
        height: o.height,
        id: o.id,
        name: o.name.clone(),
        properties: o
            .properties
            .iter()
            .map(|p| RoomProperty {
                name: p.name.clone(),
                kind: p.kind.clone(),
                value: serde_json::Value::String(p.value.clone()),
            })
            .collect(),
        rotation: o.rotation,
        kind: o.kind.clone(),
        visible: o.visible,
        width: o.width,
        x: o.x,
        y: o.y,
        extra: JsonMap::new(),
    }
}

/// Strip the runtime-relative `../tiles/` prefix from a tileset source.
pub fn authoring_tileset_source(source: &str) -> &str {
    source
        .strip_prefix(RUNTIME_TILESET_PREFIX)
        .unwrap_or(source)
}

/// Build an authoring map from a runtime room.
///
/// Runtime layer ids are ignored and reassigned; CSV grids go through
/// [`csv::repair`] so the authoring tool accepts them.
pub fn room_to_map(room: &RoomDocument) -> Result<MapDocument, MapError> {
    let width = required(room.width, "width")?;
    let height = required(room.height, "height")?;
    let tile_width = required(room.tilewidth, "tilewidth")?;
    let tile_height = required(room.tileheight, "tileheight")?;
    let next_layer_id = required(room.nextlayerid, "nextlayerid")?;
    let next_object_id = required(room.nextobjectid, "nextobjectid")?;

    let tilesets = room
        .tilesets
        .iter()
        .map(|ts| TilesetRef {
            first_gid: ts.firstgid,
            source: ts
                .source
                .as_deref()
                .map(|s| authoring_tileset_source(s).to_owned()),
        })
        .collect();

    let mut layers = Vec::with_capacity(room.layers.len());
    let mut layer_id = 1u32;

    for layer in &room.layers {
        match layer {
            RoomLayer::Tiles(l) => {
                let layer_width = l.width.unwrap_or(width);
                let (encoding, text) = match &l.data {
                    RoomTileData::Gids(gids) => (
                        "csv".to_owned(),
                        csv::repair(&csv::encode_gids(gids, layer_width as usize)),
                    ),
                    RoomTileData::Csv(text) if l.encoding == "csv" => {
                        (l.encoding.clone(), csv::repair(text))
                    }
                    RoomTileData::Csv(text) => (l.encoding.clone(), text.clone()),
                };
                debug!(id = layer_id, name = %l.name, "tile layer");
                layers.push(Layer::Tiles(TileLayer {
                    id: Some(layer_id),
                    name: Some(l.name.clone()),
                    width: Some(layer_width),
                    height: Some(l.height.unwrap_or(height)),
                    data: Some(LayerData {
                        encoding: Some(encoding),
                        text,
                    }),
                }));
            }
            RoomLayer::Objects(g) => {
                debug!(id = layer_id, name = %g.name, objects = g.objects.len(), "object group");
                layers.push(Layer::Objects(ObjectGroup {
                    id: Some(layer_id),
                    name: g.name.clone(),
                    draw_order: Some(g.draworder.clone()),
                    objects: g.objects.iter().map(object_to_map).collect(),
                }));
            }
            RoomLayer::Other(raw) => {
                debug!(kind = ?raw.get("type"), "skipping unsupported layer");
                continue;
            }
        }
        layer_id += 1;
    }

    Ok(MapDocument {
        version: Some(room.version.clone()),
        tiled_version: Some(room.tiledversion.clone()),
        orientation: Some(room.orientation.clone()),
        render_order: Some(room.renderorder.clone()),
        width: Some(width),
        height: Some(height),
        tile_width: Some(tile_width),
        tile_height: Some(tile_height),
        next_layer_id: Some(next_layer_id),
        next_object_id: Some(next_object_id),
        infinite: room.infinite,
        tilesets,
        layers,
    })
}

fn object_to_map(o: &RoomObject) -> MapObject {
    MapObject {
        id: o.id,
        name: o.name.clone(),
        kind: o.kind.clone(),
        x: o.x,
        y: o.y,
        width: o.width,
        height: o.height,
        rotation: o.rotation,
        visible: o.visible,
        properties: o
            .properties
            .iter()
            .map(|p| Property {
                name: p.name.clone(),
                kind: p.kind.clone(),
                value: p.value_text(),
            })
            .collect(),
    }
}
