//! Authoring-format (`.tmx`) map documents.
//!
//! Only the subset of TMX the room pipeline uses is modelled: map attributes,
//! external tileset references, CSV tile layers and object groups with
//! string-typed properties. Anything else in the file (image layers, groups,
//! map properties, embedded tileset contents) is skipped on read, so this
//! model is for translation only; in-place edits work on the event stream
//! instead (see [`crate::migrate::cleanup_tilesets`]).

use crate::error::MapError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::str::FromStr;

/// Root of an authoring-format document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapDocument {
    pub version: Option<String>,
    pub tiled_version: Option<String>,
    pub orientation: Option<String>,
    pub render_order: Option<String>,
    /// Width in tiles
    pub width: Option<u32>,
    /// Height in tiles
    pub height: Option<u32>,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    pub next_layer_id: Option<u32>,
    pub next_object_id: Option<u32>,
    pub infinite: bool,
    pub tilesets: Vec<TilesetRef>,
    /// Tile layers and object groups in declaration order
    pub layers: Vec<Layer>,
}

/// External tileset reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetRef {
    pub first_gid: u32,
    pub source: Option<String>,
}

/// One layer of a map, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    /// `<layer>`
    Tiles(TileLayer),
    /// `<objectgroup>`
    Objects(ObjectGroup),
}

impl Layer {
    /// Layer name, empty when the attribute is absent.
    pub fn name(&self) -> &str {
        match self {
            Layer::Tiles(l) => l.name.as_deref().unwrap_or_default(),
            Layer::Objects(g) => &g.name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileLayer {
    pub id: Option<u32>,
    pub name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub data: Option<LayerData>,
}

/// Contents of a tile layer's `<data>` node, kept as raw text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerData {
    pub encoding: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectGroup {
    pub id: Option<u32>,
    pub name: String,
    pub draw_order: Option<String>,
    pub objects: Vec<MapObject>,
}

/// An object with absent attributes already defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct MapObject {
    pub id: u32,
    pub name: String,
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
    pub visible: bool,
    pub properties: Vec<Property>,
}

impl Default for MapObject {
    fn default() -> Self {
        MapObject {
            id: 0,
            name: String::new(),
            kind: String::new(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            rotation: 0.0,
            visible: true,
            properties: Vec::new(),
        }
    }
}

/// Custom property. `value` stays text; `kind` only tags its meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub kind: String,
    pub value: String,
}

/// Attributes of one element, unescaped.
pub(crate) struct Attrs {
    pub(crate) element: String,
    pairs: Vec<(String, String)>,
}

impl Attrs {
    pub(crate) fn read(e: &BytesStart) -> Result<Self, MapError> {
        let mut pairs = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            pairs.push((key, value));
        }
        Ok(Attrs {
            element: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            pairs,
        })
    }

    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_owned)
    }

    fn num<T: FromStr>(&self, key: &str) -> Result<Option<T>, MapError> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                MapError::MalformedInput(format!(
                    "<{}> attribute '{key}' is not numeric: '{raw}'",
                    self.element
                ))
            }),
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"),
        }
    }
}

fn object_from_attrs(a: &Attrs) -> Result<MapObject, MapError> {
    Ok(MapObject {
        id: a.num("id")?.unwrap_or(0),
        name: a.string("name").unwrap_or_default(),
        kind: a.string("type").unwrap_or_default(),
        x: a.num("x")?.unwrap_or(0.0),
        y: a.num("y")?.unwrap_or(0.0),
        width: a.num("width")?.unwrap_or(0.0),
        height: a.num("height")?.unwrap_or(0.0),
        rotation: a.num("rotation")?.unwrap_or(0.0),
        visible: a.flag("visible", true),
        properties: Vec::new(),
    })
}

impl MapDocument {
    /// Parse an authoring document from XML text.
    pub fn from_xml_str(xml: &str) -> Result<Self, MapError> {
        let mut reader = Reader::from_str(xml);
        let mut path: Vec<String> = Vec::new();
        let mut doc: Option<MapDocument> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let attrs = Attrs::read(&e)?;
                    Self::open_element(&mut doc, &path, &attrs)?;
                    path.push(attrs.element);
                }
                Event::Empty(e) => {
                    let attrs = Attrs::read(&e)?;
                    Self::open_element(&mut doc, &path, &attrs)?;
                }
                Event::End(_) => {
                    path.pop();
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    Self::append_data(&mut doc, &path, &text);
                }
                Event::CData(c) => {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    Self::append_data(&mut doc, &path, &text);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        doc.ok_or_else(|| MapError::MalformedInput("no <map> root element".into()))
    }

    fn open_element(
        doc: &mut Option<MapDocument>,
        path: &[String],
        a: &Attrs,
    ) -> Result<(), MapError> {
        let parents: Vec<&str> = path.iter().map(String::as_str).collect();

        if parents.is_empty() {
            if a.element != "map" {
                return Err(MapError::MalformedInput(format!(
                    "root element is <{}>, expected <map>",
                    a.element
                )));
            }
            *doc = Some(MapDocument {
                version: a.string("version"),
                tiled_version: a.string("tiledversion"),
                orientation: a.string("orientation"),
                render_order: a.string("renderorder"),
                width: a.num("width")?,
                height: a.num("height")?,
                tile_width: a.num("tilewidth")?,
                tile_height: a.num("tileheight")?,
                next_layer_id: a.num("nextlayerid")?,
                next_object_id: a.num("nextobjectid")?,
                infinite: a.flag("infinite", false),
                tilesets: Vec::new(),
                layers: Vec::new(),
            });
            return Ok(());
        }

        let Some(map) = doc.as_mut() else {
            return Ok(());
        };

        match (parents.as_slice(), a.element.as_str()) {
            (["map"], "tileset") => {
                let first_gid = a.num("firstgid")?.ok_or_else(|| {
                    MapError::MalformedInput("<tileset> without firstgid".into())
                })?;
                map.tilesets.push(TilesetRef {
                    first_gid,
                    source: a.string("source"),
                });
            }
            (["map"], "layer") => {
                map.layers.push(Layer::Tiles(TileLayer {
                    id: a.num("id")?,
                    name: a.string("name"),
                    width: a.num("width")?,
                    height: a.num("height")?,
                    data: None,
                }));
            }
            (["map", "layer"], "data") => {
                if let Some(Layer::Tiles(layer)) = map.layers.last_mut() {
                    layer.data = Some(LayerData {
                        encoding: a.string("encoding"),
                        text: String::new(),
                    });
                }
            }
            (["map"], "objectgroup") => {
                map.layers.push(Layer::Objects(ObjectGroup {
                    id: a.num("id")?,
                    name: a.string("name").unwrap_or_default(),
                    draw_order: a.string("draworder"),
                    objects: Vec::new(),
                }));
            }
            (["map", "objectgroup"], "object") => {
                let object = object_from_attrs(a)?;
                if let Some(Layer::Objects(group)) = map.layers.last_mut() {
                    group.objects.push(object);
                }
            }
            (["map", "objectgroup", "object", "properties"], "property") => {
                let property = Property {
                    name: a.string("name").unwrap_or_default(),
                    kind: a.string("type").unwrap_or_else(|| "string".to_owned()),
                    value: a.string("value").unwrap_or_default(),
                };
                if let Some(Layer::Objects(group)) = map.layers.last_mut() {
                    if let Some(object) = group.objects.last_mut() {
                        object.properties.push(property);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn append_data(doc: &mut Option<MapDocument>, path: &[String], text: &str) {
        if !matches!(path, [m, l, d] if m == "map" && l == "layer" && d == "data") {
            return;
        }
        if let Some(Layer::Tiles(layer)) = doc.as_mut().and_then(|m| m.layers.last_mut()) {
            if let Some(data) = layer.data.as_mut() {
                data.text.push_str(text);
            }
        }
    }

    /// Serialise as TMX with an XML declaration and one-space indentation.
    ///
    /// Every attribute that is `None` is left out; object `rotation` is
    /// written only when non-zero.
    pub fn to_xml_string(&self) -> Result<String, MapError> {
        let mut w = Writer::new_with_indent(Vec::new(), b' ', 1);
        emit(
            &mut w,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;

        let mut root = BytesStart::new("map");
        push_opt(&mut root, "version", self.version.as_deref());
        push_opt(&mut root, "tiledversion", self.tiled_version.as_deref());
        push_opt(&mut root, "orientation", self.orientation.as_deref());
        push_opt(&mut root, "renderorder", self.render_order.as_deref());
        push_num(&mut root, "width", self.width);
        push_num(&mut root, "height", self.height);
        push_num(&mut root, "tilewidth", self.tile_width);
        push_num(&mut root, "tileheight", self.tile_height);
        root.push_attribute(("infinite", if self.infinite { "1" } else { "0" }));
        push_num(&mut root, "nextlayerid", self.next_layer_id);
        push_num(&mut root, "nextobjectid", self.next_object_id);
        emit(&mut w, Event::Start(root))?;

        for ts in &self.tilesets {
            let mut el = BytesStart::new("tileset");
            el.push_attribute(("firstgid", ts.first_gid.to_string().as_str()));
            push_opt(&mut el, "source", ts.source.as_deref());
            emit(&mut w, Event::Empty(el))?;
        }

        for layer in &self.layers {
            match layer {
                Layer::Tiles(l) => write_tile_layer(&mut w, l)?,
                Layer::Objects(g) => write_object_group(&mut w, g)?,
            }
        }

        emit(&mut w, Event::End(BytesEnd::new("map")))?;
        Ok(String::from_utf8_lossy(&w.into_inner()).into_owned())
    }
}

fn write_tile_layer(w: &mut Writer<Vec<u8>>, l: &TileLayer) -> Result<(), MapError> {
    let mut el = BytesStart::new("layer");
    push_num(&mut el, "id", l.id);
    push_opt(&mut el, "name", l.name.as_deref());
    push_num(&mut el, "width", l.width);
    push_num(&mut el, "height", l.height);

    let Some(data) = &l.data else {
        return emit(w, Event::Empty(el));
    };
    emit(w, Event::Start(el))?;

    let mut data_el = BytesStart::new("data");
    push_opt(&mut data_el, "encoding", data.encoding.as_deref());
    emit(w, Event::Start(data_el))?;
    emit(w, Event::Text(BytesText::new(&data.text)))?;
    emit(w, Event::End(BytesEnd::new("data")))?;

    emit(w, Event::End(BytesEnd::new("layer")))
}

fn write_object_group(w: &mut Writer<Vec<u8>>, g: &ObjectGroup) -> Result<(), MapError> {
    let mut el = BytesStart::new("objectgroup");
    push_num(&mut el, "id", g.id);
    el.push_attribute(("name", g.name.as_str()));
    push_opt(&mut el, "draworder", g.draw_order.as_deref());

    if g.objects.is_empty() {
        return emit(w, Event::Empty(el));
    }
    emit(w, Event::Start(el))?;

    for obj in &g.objects {
        let mut o = BytesStart::new("object");
        o.push_attribute(("id", obj.id.to_string().as_str()));
        o.push_attribute(("name", obj.name.as_str()));
        o.push_attribute(("type", obj.kind.as_str()));
        o.push_attribute(("x", obj.x.to_string().as_str()));
        o.push_attribute(("y", obj.y.to_string().as_str()));
        o.push_attribute(("width", obj.width.to_string().as_str()));
        o.push_attribute(("height", obj.height.to_string().as_str()));
        o.push_attribute(("visible", if obj.visible { "true" } else { "false" }));
        if obj.rotation != 0.0 {
            o.push_attribute(("rotation", obj.rotation.to_string().as_str()));
        }

        if obj.properties.is_empty() {
            emit(w, Event::Empty(o))?;
            continue;
        }
        emit(w, Event::Start(o))?;
        emit(w, Event::Start(BytesStart::new("properties")))?;
        for p in &obj.properties {
            let mut pe = BytesStart::new("property");
            pe.push_attribute(("name", p.name.as_str()));
            pe.push_attribute(("type", p.kind.as_str()));
            pe.push_attribute(("value", p.value.as_str()));
            emit(w, Event::Empty(pe))?;
        }
        emit(w, Event::End(BytesEnd::new("properties")))?;
        emit(w, Event::End(BytesEnd::new("object")))?;
    }

    emit(w, Event::End(BytesEnd::new("objectgroup")))
}

pub(crate) fn emit(w: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), MapError> {
    w.write_event(event).map_err(|e| MapError::Xml(e.into()))
}

fn push_opt(el: &mut BytesStart, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        el.push_attribute((key, v));
    }
}

fn push_num(el: &mut BytesStart, key: &str, value: Option<u32>) {
    if let Some(v) = value {
        el.push_attribute((key, v.to_string().as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM_TMX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" tiledversion="1.11.2" orientation="orthogonal" renderorder="right-down" width="2" height="2" tilewidth="32" tileheight="32" infinite="0" nextlayerid="4" nextobjectid="3">
 <tileset firstgid="1" source="dunjon_tileset.tsx"/>
 <layer id="1" name="Ground" width="2" height="2">
  <data encoding="csv">
1,1,
2,2
</data>
 </layer>
 <objectgroup id="2" name="Entities">
  <object id="1" name="door" type="Door" x="32" y="64.5" width="32" height="32" rotation="90">
   <properties>
    <property name="target" value="B2"/>
    <property name="locked" type="bool" value="true"/>
   </properties>
  </object>
  <object id="2" name="spawn" x="0" y="0" visible="0"/>
 </objectgroup>
 <layer id="3" name="Collision" width="2" height="2">
  <data encoding="csv">0,0,
0,0</data>
 </layer>
</map>
"#;

    #[test]
    fn parses_map_attributes_and_tilesets() {
        let doc = MapDocument::from_xml_str(ROOM_TMX).expect("parse");
        assert_eq!(doc.width, Some(2));
        assert_eq!(doc.tile_height, Some(32));
        assert_eq!(doc.next_layer_id, Some(4));
        assert!(!doc.infinite);
        assert_eq!(
            doc.tilesets,
            vec![TilesetRef {
                first_gid: 1,
                source: Some("dunjon_tileset.tsx".into())
            }]
        );
    }

    #[test]
    fn keeps_layers_in_declaration_order() {
        let doc = MapDocument::from_xml_str(ROOM_TMX).expect("parse");
        let names: Vec<&str> = doc.layers.iter().map(Layer::name).collect();
        assert_eq!(names, ["Ground", "Entities", "Collision"]);

        match &doc.layers[0] {
            Layer::Tiles(l) => {
                let data = l.data.as_ref().expect("data node");
                assert_eq!(data.encoding.as_deref(), Some("csv"));
                assert_eq!(data.text, "\n1,1,\n2,2\n");
            }
            other => panic!("expected tile layer, got {other:?}"),
        }
    }

    #[test]
    fn objects_get_defaults_and_properties() {
        let doc = MapDocument::from_xml_str(ROOM_TMX).expect("parse");
        let Layer::Objects(group) = &doc.layers[1] else {
            panic!("expected object group");
        };
        let door = &group.objects[0];
        assert_eq!(door.kind, "Door");
        assert_eq!(door.y, 64.5);
        assert_eq!(door.rotation, 90.0);
        assert!(door.visible);
        assert_eq!(door.properties[0].kind, "string");
        assert_eq!(door.properties[1].value, "true");

        let spawn = &group.objects[1];
        assert_eq!(spawn.width, 0.0);
        assert_eq!(spawn.kind, "");
        assert!(!spawn.visible);
        assert!(spawn.properties.is_empty());
    }

    #[test]
    fn rejects_non_numeric_map_dimensions() {
        let err = MapDocument::from_xml_str(r#"<map width="wide" height="2"/>"#).unwrap_err();
        assert!(matches!(err, MapError::MalformedInput(_)));
    }

    #[test]
    fn rejects_wrong_root_and_broken_xml() {
        assert!(matches!(
            MapDocument::from_xml_str("<tileset/>").unwrap_err(),
            MapError::MalformedInput(_)
        ));
        assert!(MapDocument::from_xml_str("<map><layer></map>")
            .unwrap_err()
            .is_malformed());
    }

    #[test]
    fn writes_rotation_only_when_non_zero() {
        let doc = MapDocument::from_xml_str(ROOM_TMX).expect("parse");
        let xml = doc.to_xml_string().expect("write");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(r#"rotation="90""#));
        assert_eq!(xml.matches("rotation=").count(), 1);
        assert!(xml.contains(r#"visible="false""#));
        assert!(xml.contains(r#"infinite="0""#));
    }

    #[test]
    fn written_xml_parses_back_to_same_document() {
        let doc = MapDocument::from_xml_str(ROOM_TMX).expect("parse");
        let again = MapDocument::from_xml_str(&doc.to_xml_string().expect("write")).expect("reparse");
        assert_eq!(again, doc);
    }
}
