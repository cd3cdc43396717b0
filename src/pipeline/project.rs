use bson::Document as BsonDocument;

use super::types::{ProjectField, ProjectSpec};
use crate::document::{copy_path, remove_path, set_path};

/// Reshapes one document. Expressions always see the input document, never the
/// partially built output.
pub(crate) fn apply(doc: BsonDocument, spec: &ProjectSpec) -> BsonDocument {
    if spec.include_all {
        let mut out = doc.clone();
        for (path, field) in &spec.fields {
            match field {
                ProjectField::Include => {}
                ProjectField::Exclude => {
                    remove_path(&mut out, path);
                }
                ProjectField::Expr(expr) => match expr.eval(&doc) {
                    Some(v) => set_path(&mut out, path, v),
                    None => {
                        remove_path(&mut out, path);
                    }
                },
            }
        }
        return out;
    }
    let mut out = BsonDocument::new();
    for (path, field) in &spec.fields {
        match field {
            ProjectField::Include => copy_path(&doc, &mut out, path),
            ProjectField::Expr(expr) => {
                if let Some(v) = expr.eval(&doc) {
                    set_path(&mut out, path, v);
                }
            }
            ProjectField::Exclude => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldPath;
    use crate::pipeline::expr::Expression;
    use bson::{Bson, doc, oid::ObjectId};

    fn p(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    #[test]
    fn inclusion_keeps_only_listed_fields_in_listed_order() {
        let id = ObjectId::new();
        let d = doc! {"_id": id, "total_spent": 1550, "customer": {"name": "John Doe", "email": "johndoe@example.com"}};
        let spec = ProjectSpec::inclusion()
            .with(p("name"), ProjectField::Expr(Expression::field("$customer.name").unwrap()))
            .with(p("total_spent"), ProjectField::Include);
        assert_eq!(apply(d, &spec), doc! {"name": "John Doe", "total_spent": 1550});
    }

    #[test]
    fn id_survives_only_when_listed() {
        let id = ObjectId::new();
        let spec = ProjectSpec::inclusion().with(p("_id"), ProjectField::Include).with(p("n"), ProjectField::Include);
        assert_eq!(apply(doc! {"_id": id, "n": 1, "x": 2}, &spec), doc! {"_id": id, "n": 1});
    }

    #[test]
    fn missing_values_are_omitted() {
        let spec = ProjectSpec::inclusion()
            .with(p("email"), ProjectField::Include)
            .with(p("city"), ProjectField::Expr(Expression::field("address.city").unwrap()));
        assert_eq!(apply(doc! {"name": "Bob"}, &spec), doc! {});
    }

    #[test]
    fn nested_inclusion_rebuilds_subdocuments() {
        let spec = ProjectSpec::inclusion().with(p("address.city"), ProjectField::Include);
        let d = doc! {"address": {"street": "123 Main St", "city": "Springfield"}};
        assert_eq!(apply(d, &spec), doc! {"address": {"city": "Springfield"}});
    }

    #[test]
    fn inclusion_through_arrays_keeps_each_element() {
        let spec = ProjectSpec::inclusion().with(p("items.product_name"), ProjectField::Include);
        let d = doc! {"items": [{"product_name": "Laptop", "price": 1200}, {"product_name": "Mouse", "price": 50}]};
        assert_eq!(apply(d, &spec), doc! {"items": [{"product_name": "Laptop"}, {"product_name": "Mouse"}]});
    }

    #[test]
    fn include_all_overrides_and_removes() {
        let spec = ProjectSpec::include_all()
            .with(p("phone"), ProjectField::Exclude)
            .with(p("total"), ProjectField::Expr(Expression::Literal(Bson::Int32(0))))
            .with(p("name"), ProjectField::Expr(Expression::field("$nick").unwrap()));
        let d = doc! {"name": "Alice", "phone": "555-8765", "total": 70};
        assert_eq!(apply(d, &spec), doc! {"total": 0});
    }
}
