use aggrelite::document::FieldPath;
use aggrelite::errors::DbError;
use aggrelite::pipeline::{
    Accumulator, Expression, GroupSpec, LookupSpec, Pipeline, ProjectField, ProjectSpec, Stage, UnwindSpec,
};
use aggrelite::query::{CmpOp, Filter, Order, ParseContext, SortSpec};
use aggrelite::utils::time::parse_instant;
use aggrelite::{AggregateOptions, Database};
use bson::{Bson, doc};

fn path(s: &str) -> FieldPath {
    FieldPath::parse(s).unwrap()
}

fn shop() -> Database {
    let db = Database::new();
    let ids = db
        .insert_many("customers", vec![doc! {"name": "Ann"}, doc! {"name": "Ben"}, doc! {"name": "Cy"}])
        .unwrap();
    db.insert_many(
        "orders",
        vec![
            doc! {"customer_id": ids[0].0, "total": 10, "items": ["a", "b"]},
            doc! {"customer_id": ids[1].0, "total": 25, "items": []},
            doc! {"customer_id": ids[0].0, "total": 5, "items": ["c"]},
        ],
    )
    .unwrap();
    db
}

#[test]
fn typed_stages_compose() {
    let db = shop();
    let stages = vec![
        Stage::Filter(Filter::cmp("total", CmpOp::Gte, 5).unwrap()),
        Stage::Group(
            GroupSpec::new(Expression::field("$customer_id").unwrap())
                .field("spent", Accumulator::Sum(Expression::field("$total").unwrap()))
                .field("orders", Accumulator::Count),
        ),
        Stage::Sort(vec![SortSpec::new(path("spent"), Order::Desc)]),
        Stage::Lookup(LookupSpec::new("customers", "_id", "_id", "customer").unwrap()),
        Stage::Unwind(UnwindSpec::new(path("customer"))),
        Stage::Project(
            ProjectSpec::inclusion()
                .with(path("name"), ProjectField::Expr(Expression::field("$customer.name").unwrap()))
                .with(path("spent"), ProjectField::Include)
                .with(path("orders"), ProjectField::Include),
        ),
    ];
    let rows = db.aggregate("orders", stages).unwrap().to_vec();
    assert_eq!(
        rows,
        vec![doc! {"name": "Ben", "spent": 25, "orders": 1}, doc! {"name": "Ann", "spent": 15, "orders": 2}]
    );
}

#[test]
fn lookup_is_left_outer() {
    let db = shop();
    let rows = db
        .aggregate_json(
            "customers",
            r#"[{"$lookup": {"from": "orders", "localField": "_id", "foreignField": "customer_id", "as": "orders"}}]"#,
            &AggregateOptions::default(),
        )
        .unwrap()
        .to_vec();
    let counts: Vec<_> = rows.iter().map(|r| r.get_array("orders").unwrap().len()).collect();
    assert_eq!(counts, [2, 1, 0]);
}

#[test]
fn unwind_emits_one_document_per_element_and_none_for_empty() {
    let db = shop();
    let rows = db
        .aggregate_json("orders", r#"[{"$unwind": "$items"}]"#, &AggregateOptions::default())
        .unwrap()
        .to_vec();
    let items: Vec<_> = rows.iter().map(|r| r.get_str("items").unwrap()).collect();
    assert_eq!(items, ["a", "b", "c"]);

    let rows = db
        .aggregate_json(
            "orders",
            r#"[{"$unwind": {"path": "$items", "preserveNullAndEmptyArrays": true, "includeArrayIndex": "idx"}}]"#,
            &AggregateOptions::default(),
        )
        .unwrap()
        .to_vec();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1].get("idx"), Some(&Bson::Int64(1)));
    assert_eq!(rows[2].get("idx"), Some(&Bson::Null));
}

#[test]
fn malformed_stage_reports_index_and_kind() {
    let db = shop();
    let err = db
        .aggregate_json("orders", r#"[{"$limit": 2}, {"$sort": {}}]"#, &AggregateOptions::default())
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidStage { index: 1, ref kind, .. } if kind == "sort"), "{err}");

    let err = db
        .aggregate_json("orders", r#"[{"$bucket": {}}]"#, &AggregateOptions::default())
        .unwrap_err();
    assert!(matches!(err, DbError::InvalidStage { index: 0, ref kind, .. } if kind == "$bucket"));

    let err = db.aggregate_json("orders", "[{", &AggregateOptions::default()).unwrap_err();
    assert!(matches!(err, DbError::InvalidJson(_)));
}

#[test]
fn heterogeneous_values_never_abort() {
    let db = Database::new();
    db.insert_many(
        "mixed",
        vec![doc! {"v": 3}, doc! {"v": "three"}, doc! {"v": {"nested": true}}, doc! {}, doc! {"v": 2.5}],
    )
    .unwrap();
    let rows = db
        .aggregate_json(
            "mixed",
            r#"[{"$match": {"v": {"$gt": 1}}}, {"$group": {"_id": null, "s": {"$sum": "$v"}, "n": {"$sum": 1}}}]"#,
            &AggregateOptions::default(),
        )
        .unwrap()
        .to_vec();
    assert_eq!(rows, vec![doc! {"_id": Bson::Null, "s": 5.5, "n": 2}]);
}

#[test]
fn now_is_bound_from_options() {
    let db = Database::new();
    db.insert_one("c", doc! {}).unwrap();
    let now = parse_instant("2023-07-20T00:00:00Z").unwrap();
    let rows = db
        .aggregate_json("c", r#"[{"$project": {"_id": 0, "at": "$$NOW"}}]"#, &AggregateOptions::at(now))
        .unwrap()
        .to_vec();
    assert_eq!(rows, vec![doc! {"at": now}]);
    assert!(db.aggregate_json("c", r#"[{"$project": {"at": "$$NOW"}}]"#, &AggregateOptions::default()).is_err());
}

#[test]
fn cursor_counts_what_it_produced() {
    let db = shop();
    let mut cursor = db.aggregate("orders", vec![Stage::Skip(1)]).unwrap();
    assert!(cursor.next().is_some());
    assert_eq!(cursor.produced(), 1);
    assert_eq!(cursor.by_ref().count(), 1);
    assert_eq!(cursor.produced(), 2);
}

#[test]
fn prebuilt_pipeline_reruns_against_fresh_data() {
    let db = shop();
    let pipeline = Pipeline::parse_json(r#"[{"$match": {"total": {"$lt": 100}}}]"#, &ParseContext::default()).unwrap();
    assert_eq!(db.aggregate_pipeline("orders", &pipeline).count(), 3);
    db.insert_one("orders", doc! {"total": 1}).unwrap();
    assert_eq!(db.aggregate_pipeline("orders", &pipeline).count(), 4);
}
