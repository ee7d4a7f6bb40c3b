use railcad_core::records::{MileageAngleRecord, RegionRecord};
use railcad_io::table::{
    RoomRow, read_mileage_angle_table, read_mileage_list, write_crossing_table,
    write_region_table, write_room_table,
};

#[test]
fn crossing_table_writes_three_columns_with_dm_angle() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("crossings.csv");
    let records = vec![
        MileageAngleRecord::new(57_234.123_456, 68.25, "110kV线路"),
        MileageAngleRecord::new(74_901.0, 90.0, ""),
    ];
    write_crossing_table(&path, &records).expect("写出表格失败");

    let content = std::fs::read_to_string(&path).expect("read csv");
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("Mileage_m,Angle,Remark"));
    assert_eq!(lines.next(), Some("57234.123,68°15',110kV线路"));
    assert_eq!(lines.next(), Some("74901.000,90°0',"));
}

#[test]
fn mileage_angle_table_round_trips_and_skips_bad_rows() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("mileage_angle.csv");
    std::fs::write(
        &path,
        "Mileage_m,Angle,Remark\n57234.123,68°15',110kV线路\n60000,6815,\n61000,45.5,备用\nabc,90°0',坏行\n62000,??,坏角度\n",
    )
    .expect("write csv");

    let outcome = read_mileage_angle_table(&path).expect("读取表格失败");
    assert_eq!(outcome.rows.len(), 3);
    assert_eq!(outcome.skipped.len(), 2);

    assert!((outcome.rows[0].mileage_m - 57_234.123).abs() < 1e-9);
    assert!((outcome.rows[0].angle_deg - 68.25).abs() < 1e-9);
    assert_eq!(outcome.rows[0].remark, "110kV线路");
    // 紧凑数字写法 6815 → 68°15′。
    assert!((outcome.rows[1].angle_deg - 68.25).abs() < 1e-9);
    assert!((outcome.rows[2].angle_deg - 45.5).abs() < 1e-9);

    // 跳过行带行号与原因。
    assert_eq!(outcome.skipped[0].0, 5);
    assert!(outcome.skipped[0].1.contains("里程"));
    assert_eq!(outcome.skipped[1].0, 6);
}

#[test]
fn mileage_list_accepts_commas_and_whitespace() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("mileage_list.txt");
    std::fs::write(&path, "57234.5, 60000\n61000\t61500 bogus\n\n62000,\n").expect("write list");

    let outcome = read_mileage_list(&path).expect("读取里程列表失败");
    assert_eq!(outcome.rows, vec![57_234.5, 60_000.0, 61_000.0, 61_500.0, 62_000.0]);
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].0, 2);
    assert!(outcome.skipped[0].1.contains("bogus"));
}

#[test]
fn room_and_region_tables_have_expected_headers() {
    let dir = tempfile::tempdir().expect("create temp dir");

    let room_path = dir.path().join("rooms.csv");
    write_room_table(
        &room_path,
        &[RoomRow {
            text: "1-01".to_string(),
            outline: "0.000,0.000;4.000,0.000;4.000,4.000".to_string(),
            mileage_m: 57_234.123_9,
        }],
    )
    .expect("写出房屋表失败");
    let content = std::fs::read_to_string(&room_path).expect("read csv");
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("text,polyline,mileage_m"));
    assert_eq!(
        lines.next(),
        Some("1-01,\"0.000,0.000;4.000,0.000;4.000,4.000\",57234.124")
    );

    let region_path = dir.path().join("regions.csv");
    write_region_table(
        &region_path,
        &[RegionRecord {
            mileage_m: Some(60_010.5),
            min_vertex_dist: Some(12.345_6),
            area: 225.0,
        }],
    )
    .expect("写出区域表失败");
    let content = std::fs::read_to_string(&region_path).expect("read csv");
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("mileage_m,min_vertex_dist,area"));
    assert_eq!(lines.next(), Some("60010.500,12.346,225.000"));
}
