#[cfg(test)]
mod tests {
    use rowmap::{
        BatchFailure, DataObject, MappedStatement, Session, SqlMapper, SqlSource, Value,
    };
    use rowmap_mock::MockStore;
    use std::collections::BTreeMap;

    const INSERT_ACCOUNT: &str = "INSERT INTO account (id) VALUES (?)";
    const INSERT_ORDER: &str = "INSERT INTO orders (id) VALUES (?)";

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn mapper() -> SqlMapper {
        let mut mapper = SqlMapper::new();
        let registry = mapper.registry().clone();
        mapper
            .register(MappedStatement::new(
                "insertAccount",
                SqlSource::parse("INSERT INTO account (id) VALUES (#id#)", registry.as_ref())
                    .expect("parse"),
            ))
            .expect("register");
        mapper
            .register(MappedStatement::new(
                "insertOrder",
                SqlSource::parse("INSERT INTO orders (id) VALUES (#id#)", registry.as_ref())
                    .expect("parse"),
            ))
            .expect("register");
        mapper
    }

    fn id_param(id: i64) -> DataObject {
        let mut map = BTreeMap::new();
        map.insert("id".to_string(), DataObject::Scalar(Value::Int64(Some(id))));
        DataObject::Map(map)
    }

    #[test]
    fn same_sql_shares_one_sub_batch_and_one_prepare() {
        init_logs();
        let store = MockStore::new();
        store.on_update(INSERT_ACCOUNT, 1);
        let mut conn = store.connection();
        let mapper = mapper();
        let mut session = Session::new();

        mapper
            .add_batch(&mut session, &mut conn, "insertAccount", &id_param(1))
            .expect("batch 1");
        mapper
            .add_batch(&mut session, &mut conn, "insertAccount", &id_param(2))
            .expect("batch 2");
        let total = mapper.execute_batch(&mut session, &mut conn).expect("execute");

        assert_eq!(total, 2);
        assert_eq!(store.prepare_count(INSERT_ACCOUNT), 1);
        assert_eq!(store.executed_batches(), vec![(INSERT_ACCOUNT.to_string(), 2)]);
    }

    #[test]
    fn changing_sql_opens_a_new_sub_batch() {
        init_logs();
        let store = MockStore::new();
        store.on_update(INSERT_ACCOUNT, 1);
        store.on_update(INSERT_ORDER, 1);
        let mut conn = store.connection();
        let mapper = mapper();
        let mut session = Session::new();

        mapper
            .add_batch(&mut session, &mut conn, "insertAccount", &id_param(1))
            .expect("batch 1");
        mapper
            .add_batch(&mut session, &mut conn, "insertOrder", &id_param(2))
            .expect("batch 2");
        mapper
            .add_batch(&mut session, &mut conn, "insertOrder", &id_param(3))
            .expect("batch 3");
        let results = mapper
            .execute_batch_detailed(&mut session, &mut conn)
            .expect("execute");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sql, INSERT_ACCOUNT);
        assert_eq!(results[0].update_counts, vec![1]);
        assert_eq!(results[1].sql, INSERT_ORDER);
        assert_eq!(results[1].update_counts, vec![1, 1]);
        assert_eq!(
            store.executed_batches(),
            vec![(INSERT_ACCOUNT.to_string(), 1), (INSERT_ORDER.to_string(), 2)]
        );
    }

    #[test]
    fn failed_sub_batch_reports_completed_work() {
        init_logs();
        let store = MockStore::new();
        store.on_update(INSERT_ACCOUNT, 1);
        store.fail_batch_on(INSERT_ORDER, "duplicate key");
        let mut conn = store.connection();
        let mapper = mapper();
        let mut session = Session::new();

        mapper
            .add_batch(&mut session, &mut conn, "insertAccount", &id_param(1))
            .expect("batch 1");
        mapper
            .add_batch(&mut session, &mut conn, "insertOrder", &id_param(2))
            .expect("batch 2");
        let error = mapper
            .execute_batch_detailed(&mut session, &mut conn)
            .expect_err("second sub-batch fails");

        let failure = error.downcast_ref::<BatchFailure>().expect("BatchFailure");
        assert_eq!(failure.completed.len(), 1);
        assert_eq!(failure.completed[0].sql, INSERT_ACCOUNT);
        assert_eq!(failure.failing_sql, INSERT_ORDER);
        assert_eq!(failure.failing_index, 1);
        assert!(failure.source.to_string().contains("duplicate key"));
    }

    #[test]
    fn executing_an_empty_batch_is_a_no_op() {
        init_logs();
        let store = MockStore::new();
        let mut conn = store.connection();
        let mapper = mapper();
        let mut session = Session::new();
        assert_eq!(
            mapper.execute_batch(&mut session, &mut conn).expect("empty"),
            0
        );
        assert!(store.executed_batches().is_empty());
    }

    #[test]
    fn prepared_statements_are_reused_across_executions() {
        init_logs();
        let store = MockStore::new();
        store.on_update(INSERT_ACCOUNT, 1);
        let mut conn = store.connection();
        let mapper = mapper();
        let mut session = Session::new();

        for id in 0..3 {
            mapper
                .update(&mut session, &mut conn, "insertAccount", &id_param(id))
                .expect("update");
        }
        assert_eq!(store.prepare_count(INSERT_ACCOUNT), 1);
        assert_eq!(store.executions().len(), 3);
    }
}
