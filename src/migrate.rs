//! One-off document rewrites: tile-size migration for rooms and tileset
//! cleanup for authoring maps.

use crate::convert::RUNTIME_TILESET_PREFIX;
use crate::error::MapError;
use crate::room::{RoomDocument, RoomLayer};
use crate::tmx::{emit, Attrs};
use crate::validate::CANONICAL_TILESET;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

/// Move a room to a new tile size.
///
/// Object positions scale by `tile_size / old tile width`; every non-zero
/// object width or height becomes `tile_size`. Tileset sources are pointed
/// at the canonical tileset.
pub fn rescale_room(room: &mut RoomDocument, tile_size: u32) -> Result<(), MapError> {
    let old = room
        .tilewidth
        .filter(|w| *w > 0)
        .ok_or_else(|| MapError::MalformedInput("room has no usable tilewidth".into()))?;
    let factor = f64::from(tile_size) / f64::from(old);
    let size = f64::from(tile_size);

    room.tilewidth = Some(tile_size);
    room.tileheight = Some(tile_size);

    for ts in &mut room.tilesets {
        if ts.source.is_some() {
            ts.source = Some(format!("{RUNTIME_TILESET_PREFIX}{CANONICAL_TILESET}"));
        }
    }

    for layer in &mut room.layers {
        let RoomLayer::Objects(group) = layer else {
            continue;
        };
        for obj in &mut group.objects {
            obj.x *= factor;
            obj.y *= factor;
            if obj.width > 0.0 {
                obj.width = size;
            }
            if obj.height > 0.0 {
                obj.height = size;
            }
        }
    }
    debug!(from = old, to = tile_size, factor, "rescaled room");
    Ok(())
}

fn is_legacy_wall_sheet(source: &str) -> bool {
    source.contains("Dungeon_wall") || source.contains("dungeon_wall")
}

/// Outcome of [`cleanup_tilesets`].
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetCleanup {
    /// The rewritten document
    pub xml: String,
    /// Sources of the dropped tilesets, in document order
    pub removed: Vec<String>,
    /// Whether the canonical tileset had to be added
    pub added_canonical: bool,
}

fn is_map_tileset(e: &BytesStart, depth: usize) -> bool {
    depth == 1 && e.name().as_ref() == b"tileset"
}

/// Checks the root element and reports whether a canonical tileset survives
/// the cleanup.
fn scan_tilesets(xml: &str) -> Result<bool, MapError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut canonical = false;

    loop {
        let (e, opens) = match reader.read_event()? {
            Event::Start(e) => (e, true),
            Event::Empty(e) => (e, false),
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        if depth == 0 {
            let root = Attrs::read(&e)?;
            if root.element != "map" {
                return Err(MapError::MalformedInput(format!(
                    "root element is <{}>, expected <map>",
                    root.element
                )));
            }
            seen_root = true;
        } else if is_map_tileset(&e, depth) {
            let attrs = Attrs::read(&e)?;
            let source = attrs.get("source").unwrap_or_default();
            canonical |= !is_legacy_wall_sheet(source) && source.contains(CANONICAL_TILESET);
        }
        if opens {
            depth += 1;
        }
    }

    if !seen_root {
        return Err(MapError::MalformedInput("no <map> root element".into()));
    }
    Ok(canonical)
}

enum TilesetEdit {
    Drop,
    Keep,
    Pin(BytesStart<'static>),
}

/// Copy of a `<tileset>` start tag with `firstgid` set to 1.
fn pinned_tileset(e: &BytesStart) -> Result<BytesStart<'static>, MapError> {
    let mut out = BytesStart::new("tileset");
    let mut pinned = false;
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == b"firstgid" {
            out.push_attribute(("firstgid", "1"));
            pinned = true;
        } else {
            out.push_attribute(attr);
        }
    }
    if !pinned {
        out.push_attribute(("firstgid", "1"));
    }
    Ok(out)
}

fn canonical_tileset() -> BytesStart<'static> {
    let mut el = BytesStart::new("tileset");
    el.push_attribute(("firstgid", "1"));
    el.push_attribute(("source", CANONICAL_TILESET));
    el
}

/// Drop legacy wall tilesets from an authoring map and make sure the
/// canonical tileset is present at firstgid 1.
///
/// Only the map's own `<tileset>` elements change; every other byte of the
/// document is copied through. A missing canonical tileset is inserted as
/// the first child of `<map>`.
pub fn cleanup_tilesets(xml: &str) -> Result<TilesetCleanup, MapError> {
    let add_canonical = !scan_tilesets(xml)?;
    let mut reader = Reader::from_str(xml);
    let mut w = Writer::new(Vec::new());
    let mut removed = Vec::new();
    let mut pin_pending = !add_canonical;
    let mut depth = 0usize;
    // nesting inside a dropped element
    let mut skip = 0usize;
    // whitespace held back so a dropped element takes its indentation along
    let mut pending_ws: Option<Event> = None;

    let mut edit = |e: &BytesStart, removed: &mut Vec<String>| -> Result<TilesetEdit, MapError> {
        let attrs = Attrs::read(e)?;
        let source = attrs.get("source").unwrap_or_default();
        if is_legacy_wall_sheet(source) {
            removed.push(source.to_owned());
            return Ok(TilesetEdit::Drop);
        }
        if pin_pending && source.contains(CANONICAL_TILESET) {
            pin_pending = false;
            return Ok(TilesetEdit::Pin(pinned_tileset(e)?));
        }
        Ok(TilesetEdit::Keep)
    };

    loop {
        let event = reader.read_event()?;
        if skip > 0 {
            match event {
                Event::Start(_) => skip += 1,
                Event::End(_) => skip -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        let event = match event {
            Event::Eof => break,
            Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => {
                if let Some(prev) = pending_ws.replace(Event::Text(t)) {
                    emit(&mut w, prev)?;
                }
                continue;
            }
            Event::Start(e) if is_map_tileset(&e, depth) => match edit(&e, &mut removed)? {
                TilesetEdit::Drop => {
                    pending_ws = None;
                    skip = 1;
                    continue;
                }
                TilesetEdit::Keep => Event::Start(e),
                TilesetEdit::Pin(el) => Event::Start(el),
            },
            Event::Empty(e) if is_map_tileset(&e, depth) => match edit(&e, &mut removed)? {
                TilesetEdit::Drop => {
                    pending_ws = None;
                    continue;
                }
                TilesetEdit::Keep => Event::Empty(e),
                TilesetEdit::Pin(el) => Event::Empty(el),
            },
            other => other,
        };

        if let Some(prev) = pending_ws.take() {
            emit(&mut w, prev)?;
        }
        match event {
            Event::Start(e) if depth == 0 => {
                emit(&mut w, Event::Start(e))?;
                depth = 1;
                if add_canonical {
                    emit(&mut w, Event::Text(BytesText::new("\n ")))?;
                    emit(&mut w, Event::Empty(canonical_tileset()))?;
                }
            }
            Event::Empty(e) if depth == 0 && add_canonical => {
                let end = e.to_end().into_owned();
                emit(&mut w, Event::Start(e))?;
                emit(&mut w, Event::Text(BytesText::new("\n ")))?;
                emit(&mut w, Event::Empty(canonical_tileset()))?;
                emit(&mut w, Event::Text(BytesText::new("\n")))?;
                emit(&mut w, Event::End(end))?;
            }
            Event::Start(e) => {
                depth += 1;
                emit(&mut w, Event::Start(e))?;
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                emit(&mut w, Event::End(e))?;
            }
            other => emit(&mut w, other)?,
        }
    }
    if let Some(prev) = pending_ws.take() {
        emit(&mut w, prev)?;
    }

    for source in &removed {
        debug!(%source, "dropped legacy tileset");
    }
    Ok(TilesetCleanup {
        xml: String::from_utf8_lossy(&w.into_inner()).into_owned(),
        removed,
        added_canonical: add_canonical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::{JsonMap, RoomObject, RoomObjectGroup, RoomTileset};
    use crate::tmx::MapDocument;

    fn room_16() -> RoomDocument {
        RoomDocument {
            tilewidth: Some(16),
            tileheight: Some(16),
            tilesets: vec![RoomTileset {
                firstgid: 1,
                source: Some("old_tiles.tsx".into()),
                extra: JsonMap::new(),
            }],
            layers: vec![RoomLayer::Objects(RoomObjectGroup {
                draworder: "topdown".into(),
                id: Some(1),
                name: "Entities".into(),
                objects: vec![
                    RoomObject {
                        height: 16.0,
                        id: 1,
                        name: "door".into(),
                        properties: vec![],
                        rotation: 0.0,
                        kind: "Door".into(),
                        visible: true,
                        width: 16.0,
                        x: 48.0,
                        y: 16.0,
                        extra: JsonMap::new(),
                    },
                    RoomObject {
                        height: 0.0,
                        id: 2,
                        name: "spawn".into(),
                        properties: vec![],
                        rotation: 0.0,
                        kind: String::new(),
                        visible: true,
                        width: 0.0,
                        x: 8.0,
                        y: 8.0,
                        extra: JsonMap::new(),
                    },
                ],
                opacity: 1.0,
                visible: true,
                x: 0,
                y: 0,
                extra: JsonMap::new(),
            })],
            ..RoomDocument::default()
        }
    }

    #[test]
    fn doubles_positions_and_resets_sizes() {
        let mut room = room_16();
        rescale_room(&mut room, 32).expect("rescale");
        assert_eq!(room.tilewidth, Some(32));
        assert_eq!(room.tileheight, Some(32));
        assert_eq!(
            room.tilesets[0].source.as_deref(),
            Some("../tiles/dunjon_tileset.tsx")
        );
        let RoomLayer::Objects(group) = &room.layers[0] else {
            panic!("expected object group");
        };
        assert_eq!((group.objects[0].x, group.objects[0].y), (96.0, 32.0));
        assert_eq!((group.objects[0].width, group.objects[0].height), (32.0, 32.0));
        assert_eq!((group.objects[1].x, group.objects[1].width), (16.0, 0.0));
    }

    #[test]
    fn rescale_needs_a_tile_width() {
        let mut room = room_16();
        room.tilewidth = None;
        assert!(rescale_room(&mut room, 32).unwrap_err().is_malformed());
    }

    #[test]
    fn rescale_keeps_layers_it_does_not_touch() {
        let mut room = room_16();
        room.layers.push(RoomLayer::Other(serde_json::json!({
            "type": "imagelayer",
            "name": "Sky",
            "image": "sky.png"
        })));
        let before = room.layers[1].clone();
        rescale_room(&mut room, 32).expect("rescale");
        assert_eq!(room.layers[1], before);
    }

    const LEGACY_MAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" width="1" height="1" tilewidth="32" tileheight="32">
 <properties>
  <property name="music" value="cave.ogg"/>
 </properties>
 <tileset firstgid="1" source="Dungeon_wall.tsx"/>
 <tileset firstgid="65" source="dunjon_tileset.tsx"/>
 <layer id="1" name="Ground" width="1" height="1" opacity="0.5" visible="0">
  <data encoding="csv">
65,
</data>
 </layer>
 <objectgroup id="2" name="Entities">
  <object id="1" name="spawn" x="8" y="8">
   <point/>
  </object>
 </objectgroup>
</map>
"#;

    #[test]
    fn cleanup_removes_wall_sheets_and_pins_canonical() {
        let cleaned = cleanup_tilesets(LEGACY_MAP).expect("cleanup");
        assert_eq!(cleaned.removed, ["Dungeon_wall.tsx"]);
        assert!(!cleaned.added_canonical);

        let expected = LEGACY_MAP
            .replace(" <tileset firstgid=\"1\" source=\"Dungeon_wall.tsx\"/>\n", "")
            .replace(r#"firstgid="65""#, r#"firstgid="1""#);
        assert_eq!(cleaned.xml, expected);
    }

    #[test]
    fn cleanup_drops_embedded_legacy_tileset_with_its_children() {
        let xml = r#"<map>
 <tileset firstgid="1" source="dungeon_wall.tsx">
  <image source="walls.png"/>
 </tileset>
 <tileset firstgid="9" name="props"/>
</map>"#;
        let cleaned = cleanup_tilesets(xml).expect("cleanup");
        assert_eq!(cleaned.removed, ["dungeon_wall.tsx"]);
        assert!(cleaned.added_canonical);
        assert!(!cleaned.xml.contains("walls.png"));
        let map = MapDocument::from_xml_str(&cleaned.xml).expect("reparse");
        let tilesets: Vec<(u32, Option<&str>)> = map
            .tilesets
            .iter()
            .map(|ts| (ts.first_gid, ts.source.as_deref()))
            .collect();
        assert_eq!(tilesets, [(1, Some(CANONICAL_TILESET)), (9, None)]);
    }

    #[test]
    fn cleanup_adds_missing_canonical_tileset() {
        let cleaned = cleanup_tilesets("<map/>").expect("cleanup");
        assert!(cleaned.removed.is_empty());
        assert!(cleaned.added_canonical);
        let map = MapDocument::from_xml_str(&cleaned.xml).expect("reparse");
        assert_eq!(map.tilesets.len(), 1);
        assert_eq!(map.tilesets[0].first_gid, 1);
        assert_eq!(map.tilesets[0].source.as_deref(), Some(CANONICAL_TILESET));
    }

    #[test]
    fn cleanup_rejects_non_map_documents() {
        let err = cleanup_tilesets("<tileset/>").unwrap_err();
        assert!(err.is_malformed());
    }
}
