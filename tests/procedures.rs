#[cfg(test)]
mod tests {
    use rowmap::{
        ColumnInfo, DataObject, DefaultTypeHandler, ListRowHandler, MappedStatement, ResultMap,
        ResultTarget, Session, SqlMapper, SqlSource, Value, ValueKind,
    };
    use rowmap_mock::{MockResult, MockStore};
    use std::{collections::BTreeMap, sync::Arc};

    const TOTAL_CALL: &str = "{call account_total(?, ?)}";
    const BUMP_CALL: &str = "{call bump(?)}";
    const REPORT_CALL: &str = "{call report(?)}";

    fn param(entries: Vec<(&str, Value)>) -> DataObject {
        DataObject::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), DataObject::Scalar(v)))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn register(mapper: &mut SqlMapper, id: &str, sql: &str) {
        let source = SqlSource::parse(sql, mapper.registry().as_ref()).expect("parse");
        mapper
            .register(MappedStatement::new(id, source))
            .expect("register");
    }

    #[test]
    fn out_parameter_is_written_back_onto_the_parameter_object() {
        let store = MockStore::new();
        store.on_update(TOTAL_CALL, 1);
        store.on_out_values(TOTAL_CALL, vec![(1, Value::Int64(Some(250)))]);
        let mut mapper = SqlMapper::new();
        register(
            &mut mapper,
            "accountTotal",
            "{call account_total(#id,type=i64#, #total,type=i64,mode=OUT#)}",
        );
        let mut session = Session::new();
        let mut conn = store.connection();

        let mut object = param(vec![("id", Value::Int64(Some(7)))]);
        let count = mapper
            .update_procedure(&mut session, &mut conn, "accountTotal", &mut object)
            .expect("call");
        assert_eq!(count, 1);
        assert_eq!(
            object.get_path("total").expect("total"),
            DataObject::Scalar(Value::Int64(Some(250)))
        );
    }

    #[test]
    fn inout_parameter_binds_in_and_receives_out() {
        let store = MockStore::new();
        store.on_update(BUMP_CALL, 1);
        store.on_out_values(BUMP_CALL, vec![(0, Value::Int64(Some(6)))]);
        let mut mapper = SqlMapper::new();
        register(&mut mapper, "bump", "{call bump(#counter,type=i64,mode=INOUT#)}");
        let mut session = Session::new();
        let mut conn = store.connection();

        let mut object = param(vec![("counter", Value::Int64(Some(5)))]);
        mapper
            .update_procedure(&mut session, &mut conn, "bump", &mut object)
            .expect("call");
        assert_eq!(
            object.get_path("counter").expect("counter"),
            DataObject::Scalar(Value::Int64(Some(6)))
        );
    }

    #[test]
    fn out_parameter_without_a_declared_type_is_rejected() {
        let store = MockStore::new();
        store.on_update(BUMP_CALL, 1);
        let mut mapper = SqlMapper::new();
        register(&mut mapper, "bump", "{call bump(#counter,mode=OUT#)}");
        let mut session = Session::new();
        let mut conn = store.connection();

        let mut object = param(vec![]);
        let error = mapper
            .update_procedure(&mut session, &mut conn, "bump", &mut object)
            .expect_err("no declared type");
        assert!(format!("{error:#}").contains("requires a declared type"));
    }

    #[test]
    fn query_procedure_maps_rows_and_applies_outputs() {
        let store = MockStore::new();
        store.on_results(
            REPORT_CALL,
            vec![MockResult::Rows {
                columns: vec![ColumnInfo::new("NAME", Some(ValueKind::Varchar))],
                rows: vec![
                    vec![Value::Varchar(Some("ada".into()))],
                    vec![Value::Varchar(Some("joe".into()))],
                ],
            }],
        );
        store.on_out_values(REPORT_CALL, vec![(0, Value::Int64(Some(2)))]);
        let mut mapper = SqlMapper::new();
        let source = SqlSource::parse(
            "{call report(#rowCount,type=i64,mode=OUT#)}",
            mapper.registry().as_ref(),
        )
        .expect("parse");
        mapper
            .register(
                MappedStatement::new("report", source).with_result_map(Arc::new(ResultMap::auto(
                    "report-auto",
                    ResultTarget::Map,
                    false,
                    Arc::new(DefaultTypeHandler),
                ))),
            )
            .expect("register");
        let mut session = Session::new();
        let mut conn = store.connection();

        let mut object = param(vec![]);
        let mut handler = ListRowHandler::default();
        mapper
            .query_procedure(&mut session, &mut conn, "report", &mut object, &mut handler)
            .expect("call");
        assert_eq!(handler.list.len(), 2);
        assert_eq!(
            handler.list[1].get_path("NAME").expect("NAME"),
            DataObject::Scalar(Value::Varchar(Some("joe".into())))
        );
        assert_eq!(
            object.get_path("rowCount").expect("rowCount"),
            DataObject::Scalar(Value::Int64(Some(2)))
        );
    }

    #[test]
    fn callable_statements_are_prepared_per_call() {
        let store = MockStore::new();
        store.on_update(BUMP_CALL, 1);
        store.on_out_values(BUMP_CALL, vec![(0, Value::Int64(Some(1)))]);
        let mut mapper = SqlMapper::new();
        register(&mut mapper, "bump", "{call bump(#counter,type=i64,mode=INOUT#)}");
        let mut session = Session::new();
        let mut conn = store.connection();

        for _ in 0..2 {
            let mut object = param(vec![("counter", Value::Int64(Some(0)))]);
            mapper
                .update_procedure(&mut session, &mut conn, "bump", &mut object)
                .expect("call");
        }
        assert_eq!(store.prepare_count(BUMP_CALL), 2);
    }
}
