// tests/batch_tests.rs

use std::fs;
use std::path::Path;

use tiled_rooms::batch::{self, Direction};
use tiled_rooms::{convert_file, MapError, PipelineConfig};

const ROOM_JSON: &str = r#"{
  "width": 2, "height": 2, "tilewidth": 32, "tileheight": 32,
  "nextlayerid": 5, "nextobjectid": 2,
  "tilesets": [{"firstgid": 1, "source": "../tiles/dunjon_tileset.tsx"}],
  "layers": [
    {"type": "tilelayer", "id": 1, "name": "Ground", "width": 2, "height": 2, "encoding": "csv", "data": "1,1,\n2,2"},
    {"type": "tilelayer", "id": 2, "name": "Collision", "width": 2, "height": 2, "encoding": "csv", "data": "0,0,\n0,0,"},
    {"type": "objectgroup", "id": 3, "name": "Entities", "objects": [
      {"id": 1, "name": "bat", "type": "Enemy", "x": 16, "y": 16, "width": 32, "height": 32}
    ]},
    {"type": "objectgroup", "id": 4, "name": "Metadata", "objects": []}
  ]
}"#;

const SMALL_TILES_JSON: &str = r#"{
  "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
  "nextlayerid": 2, "nextobjectid": 1,
  "tilesets": [{"firstgid": 1, "source": "../tiles/dunjon_tileset.tsx"}],
  "layers": [{"type": "tilelayer", "name": "Ground", "data": "0"}]
}"#;

fn pipeline(root: &Path) -> PipelineConfig {
    let config = PipelineConfig {
        tiles_dir: root.join("tiles"),
        rooms_dir: root.join("rooms"),
        ..PipelineConfig::default()
    };
    fs::create_dir_all(&config.tiles_dir).expect("tiles dir");
    fs::create_dir_all(&config.rooms_dir).expect("rooms dir");
    config
}

#[test]
fn json_to_tmx_and_back_through_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let json = dir.path().join("A1.json");
    let tmx = dir.path().join("A1.tmx");
    let again = dir.path().join("A1_again.json");
    fs::write(&json, ROOM_JSON).expect("write room");

    convert_file(&json, &tmx).expect("json -> tmx");
    let xml = fs::read_to_string(&tmx).expect("read tmx");
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains(r#"source="dunjon_tileset.tsx""#));
    assert!(xml.contains("1,1,\n2,2,"));

    convert_file(&tmx, &again).expect("tmx -> json");
    let room = batch::load_room(&again).expect("load");
    assert_eq!(room.width, Some(2));
    assert_eq!(room.layers.len(), 4);
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let src = dir.path().join("tiles.png");
    fs::write(&src, b"png").expect("write");
    let err = convert_file(&src, &dir.path().join("out.json")).unwrap_err();
    assert!(matches!(err, MapError::UnsupportedFormat(p) if p.ends_with("tiles.png")));
}

#[test]
fn malformed_source_leaves_destination_untouched() {
    let dir = tempfile::tempdir().expect("temp dir");
    let src = dir.path().join("broken.tmx");
    let dst = dir.path().join("broken.json");
    fs::write(&src, r#"<map width="2" height="2" tilewidth="32"/>"#).expect("write");
    fs::write(&dst, "previous").expect("write");

    let err = convert_file(&src, &dst).unwrap_err();
    assert!(err.is_malformed());
    assert_eq!(fs::read_to_string(&dst).expect("read"), "previous");
    assert!(!dir.path().join("broken.json.tmp").exists());
}

#[test]
fn missing_source_is_an_io_failure() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = convert_file(&dir.path().join("nope.tmx"), &dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, MapError::Io { .. }));
    assert!(!dir.path().join("nope.json").exists());
}

#[test]
fn import_then_export_counts_every_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = pipeline(dir.path());
    fs::write(config.rooms_dir.join("A1.json"), ROOM_JSON).expect("write");
    fs::write(config.rooms_dir.join("B2.json"), "{ broken").expect("write");
    fs::write(config.rooms_dir.join("enemies.json"), "[]").expect("write");

    let import = batch::convert_dir(&config, Direction::Import).expect("import");
    assert_eq!(import.total, 2);
    assert_eq!(import.succeeded, 1);
    assert_eq!(import.failures.len(), 1);
    assert!(import.failures[0].path.ends_with("B2.json"));
    assert!(config.tiles_dir.join("A1.tmx").exists());

    let export = batch::convert_dir(&config, Direction::Export).expect("export");
    assert!(export.all_ok());
    assert_eq!((export.succeeded, export.total), (1, 1));
}

#[test]
fn validate_dir_marks_failures_without_stopping() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = pipeline(dir.path());
    fs::write(config.rooms_dir.join("A1.json"), ROOM_JSON).expect("write");
    fs::write(config.rooms_dir.join("C3.json"), SMALL_TILES_JSON).expect("write");
    fs::write(config.rooms_dir.join("tuning.json"), "{}").expect("write");

    let run = batch::validate_dir(&config).expect("validate");
    assert_eq!(run.summary.total, 2);
    assert_eq!(run.summary.succeeded, 1);
    assert!(!run.summary.all_ok());
    assert!(run.summary.failures[0].reason.contains("Wrong tile size"));
    assert_eq!(run.reports.len(), 2);
}

#[test]
fn migrate_then_validate_passes_tile_size_rule() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = pipeline(dir.path());
    fs::write(config.rooms_dir.join("C3.json"), SMALL_TILES_JSON).expect("write");

    let summary = batch::migrate_dir(&config, 32).expect("migrate");
    assert!(summary.all_ok());
    let run = batch::validate_dir(&config).expect("validate");
    assert!(run.summary.all_ok());
}

#[test]
fn cleanup_and_check_tmx() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = pipeline(dir.path());
    let tmx = config.tiles_dir.join("D4.tmx");
    fs::write(
        &tmx,
        r#"<map version="1.10" width="1" height="1" tilewidth="32" tileheight="32">
 <tileset firstgid="1" source="Dungeon_wall.tsx"/>
 <layer name="Ground"><data encoding="csv">0</data></layer>
</map>"#,
    )
    .expect("write");

    assert!(batch::cleanup_dir(&config).expect("cleanup").all_ok());
    let map = batch::load_map(&tmx).expect("load");
    assert_eq!(map.tilesets.len(), 1);
    assert_eq!(map.tilesets[0].source.as_deref(), Some("dunjon_tileset.tsx"));

    let run = batch::check_maps(&[tmx]);
    assert!(run.summary.all_ok());
    // "0" lacks a trailing comma
    assert_eq!(run.reports[0].1.warnings.len(), 1);
}

#[test]
fn migrate_keeps_unmodelled_room_content() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = pipeline(dir.path());
    let path = config.rooms_dir.join("E5.json");
    fs::write(
        &path,
        r#"{
  "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
  "nextlayerid": 4, "nextobjectid": 2,
  "properties": [{"name": "music", "type": "string", "value": "cave.ogg"}],
  "tilesets": [{"firstgid": 1, "source": "old.tsx"}],
  "layers": [
    {"type": "imagelayer", "id": 1, "name": "Sky", "image": "sky.png", "opacity": 0.5},
    {"type": "tilelayer", "id": 2, "name": "Ground", "data": "0,"},
    {"type": "objectgroup", "id": 3, "name": "Entities", "objects": [
      {"id": 1, "name": "spawn", "point": true, "x": 8, "y": 4, "width": 0, "height": 0}
    ]}
  ]
}"#,
    )
    .expect("write");

    assert!(batch::migrate_dir(&config, 32).expect("migrate").all_ok());

    let out: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("valid json");
    assert_eq!(out["tilewidth"], 32);
    assert_eq!(out["properties"][0]["value"], "cave.ogg");
    assert_eq!(
        out["layers"][0],
        serde_json::json!({"type": "imagelayer", "id": 1, "name": "Sky", "image": "sky.png", "opacity": 0.5})
    );
    let spawn = &out["layers"][2]["objects"][0];
    assert_eq!(spawn["point"], true);
    assert_eq!((spawn["x"].as_f64(), spawn["y"].as_f64()), (Some(16.0), Some(8.0)));
    assert_eq!(spawn["width"].as_f64(), Some(0.0));
}

#[test]
fn cleanup_only_touches_tilesets() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = pipeline(dir.path());
    let tmx = config.tiles_dir.join("F6.tmx");
    let original = r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" width="1" height="1" tilewidth="32" tileheight="32" infinite="0">
 <properties>
  <property name="music" value="cave.ogg"/>
 </properties>
 <tileset firstgid="1" source="dunjon_tileset.tsx"/>
 <tileset firstgid="200" source="../walls/Dungeon_wall.tsx"/>
 <layer id="1" name="Ground" width="1" height="1" opacity="0.5" visible="0" offsetx="4">
  <data encoding="csv">
1,
</data>
 </layer>
 <objectgroup id="2" name="Entities">
  <object id="1" name="spawn" x="8" y="8">
   <point/>
  </object>
  <object id="2" gid="5" x="0" y="32" width="32" height="32"/>
 </objectgroup>
</map>
"#;
    fs::write(&tmx, original).expect("write");

    assert!(batch::cleanup_dir(&config).expect("cleanup").all_ok());

    let expected = original.replace(
        " <tileset firstgid=\"200\" source=\"../walls/Dungeon_wall.tsx\"/>\n",
        "",
    );
    assert_eq!(fs::read_to_string(&tmx).expect("read"), expected);
}

#[test]
fn cleanup_leaves_clean_maps_alone() {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = pipeline(dir.path());
    let tmx = config.tiles_dir.join("G7.tmx");
    let original = "<map>\n <tileset firstgid=\"1\" source=\"dunjon_tileset.tsx\"/>\n</map>\n";
    fs::write(&tmx, original).expect("write");

    assert!(batch::cleanup_dir(&config).expect("cleanup").all_ok());
    assert_eq!(fs::read_to_string(&tmx).expect("read"), original);
}

#[test]
fn failed_write_leaves_no_temp_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let dst = dir.path().join("occupied");
    fs::create_dir(&dst).expect("dir");
    fs::write(dst.join("keep"), "x").expect("write");

    let err = batch::write_atomic(&dst, "{}").unwrap_err();
    assert!(matches!(err, MapError::Io { .. }));
    assert!(!dir.path().join("occupied.tmp").exists());
    assert!(dst.join("keep").exists());

    let missing_parent = dir.path().join("nope").join("A1.json");
    assert!(batch::write_atomic(&missing_parent, "{}").is_err());
    assert!(!dir.path().join("nope").exists());
}
