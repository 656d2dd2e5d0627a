#[cfg(test)]
mod tests {
    use rowmap::{
        Bean, BeanBox, ClassDef, ColumnInfo, DataObject, DefaultTypeHandler, Discriminator,
        MappedStatement, MethodDef, Result, ResultMap, ResultMapping, ResultTarget, Session,
        SqlMapper, SqlSource, Value, ValueKind,
    };
    use rowmap_mock::{MockResult, MockStore};
    use std::{
        any::{Any, TypeId},
        sync::Arc,
    };

    fn col(name: &str, kind: ValueKind) -> ColumnInfo {
        ColumnInfo::new(name, Some(kind))
    }

    fn handler() -> Arc<DefaultTypeHandler> {
        Arc::new(DefaultTypeHandler)
    }

    fn query_statement(mapper: &mut SqlMapper, id: &str, sql: &str, map: ResultMap) {
        let source = SqlSource::parse(sql, mapper.registry().as_ref()).expect("parse");
        mapper
            .register(MappedStatement::new(id, source).with_result_map(Arc::new(map)))
            .expect("register");
    }

    #[test]
    fn auto_mapping_builds_maps_from_column_labels() {
        let store = MockStore::new();
        store.on_query(
            "SELECT * FROM account",
            vec![col("ID", ValueKind::Int64), col("NAME", ValueKind::Varchar)],
            vec![
                vec![Value::Int64(Some(1)), Value::Varchar(Some("ada".into()))],
                vec![Value::Int64(Some(2)), Value::Varchar(Some("joe".into()))],
            ],
        );
        let mut mapper = SqlMapper::new();
        query_statement(
            &mut mapper,
            "allAccounts",
            "SELECT * FROM account",
            ResultMap::auto("allAccounts-auto", ResultTarget::Map, false, handler()),
        );
        let mut session = Session::new();
        let mut conn = store.connection();

        let list = mapper
            .query_for_list(&mut session, &mut conn, "allAccounts", &DataObject::Null, None, None)
            .expect("query");
        assert_eq!(list.len(), 2);
        assert_eq!(
            list[0].get_path("NAME").expect("NAME"),
            DataObject::Scalar(Value::Varchar(Some("ada".into())))
        );
        assert_eq!(
            list[1].get_path("ID").expect("ID"),
            DataObject::Scalar(Value::Int64(Some(2)))
        );
    }

    // Bean fixture for auto mapping onto accessors.

    #[derive(Debug, Clone, Default)]
    struct Person {
        id: i64,
        name: String,
    }

    fn person(bean: &dyn Bean) -> &Person {
        bean.as_any().downcast_ref().expect("Person bean")
    }

    fn person_mut(bean: &mut dyn Bean) -> &mut Person {
        bean.as_any_mut().downcast_mut().expect("Person bean")
    }

    fn get_id(bean: &dyn Bean) -> DataObject {
        DataObject::Scalar(Value::Int64(Some(person(bean).id)))
    }

    fn set_id(bean: &mut dyn Bean, value: DataObject) -> Result<()> {
        if let DataObject::Scalar(Value::Int64(Some(id))) = value {
            person_mut(bean).id = id;
        }
        Ok(())
    }

    fn get_name(bean: &dyn Bean) -> DataObject {
        DataObject::Scalar(Value::Varchar(Some(person(bean).name.clone())))
    }

    fn set_name(bean: &mut dyn Bean, value: DataObject) -> Result<()> {
        if let DataObject::Scalar(Value::Varchar(Some(name))) = value {
            person_mut(bean).name = name;
        }
        Ok(())
    }

    static PERSON_DEF: ClassDef = ClassDef {
        name: "Person",
        type_id: || TypeId::of::<Person>(),
        parent: None,
        constructor: Some(|| Box::new(Person::default()) as BeanBox),
        methods: &[
            MethodDef::getter("getId", ValueKind::Int64, get_id),
            MethodDef::setter("setId", ValueKind::Int64, set_id),
            MethodDef::getter("getName", ValueKind::Varchar, get_name),
            MethodDef::setter("setName", ValueKind::Varchar, set_name),
        ],
        fields: &[],
    };

    impl Bean for Person {
        fn class_def(&self) -> &'static ClassDef {
            &PERSON_DEF
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
        fn clone_bean(&self) -> BeanBox {
            Box::new(self.clone())
        }
    }

    #[test]
    fn auto_mapping_matches_bean_properties_ignoring_case() {
        let store = MockStore::new();
        store.on_query(
            "SELECT * FROM person",
            vec![col("ID", ValueKind::Int64), col("NAME", ValueKind::Varchar)],
            vec![vec![Value::Int64(Some(7)), Value::Varchar(Some("grace".into()))]],
        );
        let mut mapper = SqlMapper::new();
        query_statement(
            &mut mapper,
            "onePerson",
            "SELECT * FROM person",
            ResultMap::auto(
                "onePerson-auto",
                ResultTarget::Bean(&PERSON_DEF),
                false,
                handler(),
            ),
        );
        let mut session = Session::new();
        let mut conn = store.connection();

        let object = mapper
            .query_for_object(&mut session, &mut conn, "onePerson", &DataObject::Null)
            .expect("query");
        assert_eq!(
            object.get_path("id").expect("id"),
            DataObject::Scalar(Value::Int64(Some(7)))
        );
        assert_eq!(
            object.get_path("name").expect("name"),
            DataObject::Scalar(Value::Varchar(Some("grace".into())))
        );
    }

    #[test]
    fn null_value_sentinel_replaces_null_columns() {
        let store = MockStore::new();
        store.on_query(
            "SELECT status FROM account",
            vec![col("STATUS", ValueKind::Varchar)],
            vec![vec![Value::Varchar(None)], vec![Value::Varchar(Some("OPEN".into()))]],
        );
        let mut status = ResultMapping::new("status", "STATUS", handler());
        status.kind = Some(ValueKind::Varchar);
        status.null_value = Some("UNKNOWN".to_string());
        let mut mapper = SqlMapper::new();
        query_statement(
            &mut mapper,
            "statuses",
            "SELECT status FROM account",
            ResultMap::new("statuses-map", ResultTarget::Map, vec![status]),
        );
        let mut session = Session::new();
        let mut conn = store.connection();

        let list = mapper
            .query_for_list(&mut session, &mut conn, "statuses", &DataObject::Null, None, None)
            .expect("query");
        assert_eq!(
            list[0].get_path("status").expect("status"),
            DataObject::Scalar(Value::Varchar(Some("UNKNOWN".into())))
        );
        assert_eq!(
            list[1].get_path("status").expect("status"),
            DataObject::Scalar(Value::Varchar(Some("OPEN".into())))
        );
    }

    #[test]
    fn discriminator_picks_the_sub_map_per_row() {
        let store = MockStore::new();
        store.on_query(
            "SELECT * FROM payment",
            vec![
                col("TYPE", ValueKind::Varchar),
                col("NUMBER", ValueKind::Varchar),
            ],
            vec![
                vec![Value::Varchar(Some("CARD".into())), Value::Varchar(Some("4111".into()))],
                vec![Value::Varchar(Some("WIRE".into())), Value::Varchar(Some("IBAN9".into()))],
            ],
        );
        let card_map = Arc::new(ResultMap::new(
            "card",
            ResultTarget::Map,
            vec![ResultMapping::new("cardNumber", "NUMBER", handler())],
        ));
        let base = ResultMap::new(
            "payment",
            ResultTarget::Map,
            vec![ResultMapping::new("reference", "NUMBER", handler())],
        )
        .with_discriminator(Discriminator::new("TYPE", handler()).case("CARD", card_map));
        let mut mapper = SqlMapper::new();
        query_statement(&mut mapper, "payments", "SELECT * FROM payment", base);
        let mut session = Session::new();
        let mut conn = store.connection();

        let list = mapper
            .query_for_list(&mut session, &mut conn, "payments", &DataObject::Null, None, None)
            .expect("query");
        assert_eq!(
            list[0].get_path("cardNumber").expect("cardNumber"),
            DataObject::Scalar(Value::Varchar(Some("4111".into())))
        );
        // no matching case falls back to the base shape
        assert_eq!(
            list[1].get_path("reference").expect("reference"),
            DataObject::Scalar(Value::Varchar(Some("IBAN9".into())))
        );
        assert_eq!(list[1].get_path("cardNumber").expect("absent"), DataObject::Null);
    }

    #[test]
    fn group_by_folds_rows_into_one_parent() {
        let store = MockStore::new();
        store.on_query(
            "SELECT * FROM account_orders",
            vec![
                col("ID", ValueKind::Int64),
                col("NAME", ValueKind::Varchar),
                col("ORDER_CODE", ValueKind::Varchar),
            ],
            vec![
                vec![
                    Value::Int64(Some(1)),
                    Value::Varchar(Some("ada".into())),
                    Value::Varchar(Some("A".into())),
                ],
                vec![
                    Value::Int64(Some(1)),
                    Value::Varchar(Some("ada".into())),
                    Value::Varchar(Some("B".into())),
                ],
                vec![
                    Value::Int64(Some(2)),
                    Value::Varchar(Some("joe".into())),
                    Value::Varchar(Some("C".into())),
                ],
            ],
        );
        let child = Arc::new(ResultMap::new(
            "order",
            ResultTarget::Map,
            vec![ResultMapping::new("code", "ORDER_CODE", handler())],
        ));
        let mut orders = ResultMapping::new("orders", "ORDER_CODE", handler());
        orders.nested = Some(child);
        let parent = ResultMap::new(
            "account",
            ResultTarget::Map,
            vec![
                ResultMapping::new("id", "ID", handler()),
                ResultMapping::new("name", "NAME", handler()),
                orders,
            ],
        )
        .with_group_by(["id"]);
        let mut mapper = SqlMapper::new();
        query_statement(&mut mapper, "accountOrders", "SELECT * FROM account_orders", parent);
        let mut session = Session::new();
        let mut conn = store.connection();

        let list = mapper
            .query_for_list(&mut session, &mut conn, "accountOrders", &DataObject::Null, None, None)
            .expect("query");
        assert_eq!(list.len(), 2);
        assert_eq!(
            list[0].get_path("orders[0].code").expect("first order"),
            DataObject::Scalar(Value::Varchar(Some("A".into())))
        );
        assert_eq!(
            list[0].get_path("orders[1].code").expect("second order"),
            DataObject::Scalar(Value::Varchar(Some("B".into())))
        );
        assert_eq!(
            list[1].get_path("orders[0].code").expect("third order"),
            DataObject::Scalar(Value::Varchar(Some("C".into())))
        );
        let error = list[1].get_path("orders[1]").expect_err("only one order");
        assert!(error.to_string().contains("out of bounds"));
    }

    #[test]
    fn remappable_auto_map_follows_changed_column_labels() {
        let store = MockStore::new();
        store.on_query(
            "SELECT * FROM snapshot",
            vec![col("ID", ValueKind::Int64)],
            vec![vec![Value::Int64(Some(1))]],
        );
        let mut mapper = SqlMapper::new();
        query_statement(
            &mut mapper,
            "snapshot",
            "SELECT * FROM snapshot",
            ResultMap::auto("snapshot-auto", ResultTarget::Map, true, handler()),
        );
        let mut session = Session::new();
        let mut conn = store.connection();

        let first = mapper
            .query_for_list(&mut session, &mut conn, "snapshot", &DataObject::Null, None, None)
            .expect("first query");
        assert_eq!(
            first[0].get_path("ID").expect("ID"),
            DataObject::Scalar(Value::Int64(Some(1)))
        );

        // the statement now returns a different row shape
        store.on_query(
            "SELECT * FROM snapshot",
            vec![
                col("CODE", ValueKind::Varchar),
                col("LABEL", ValueKind::Varchar),
            ],
            vec![vec![
                Value::Varchar(Some("A".into())),
                Value::Varchar(Some("first".into())),
            ]],
        );
        let second = mapper
            .query_for_list(&mut session, &mut conn, "snapshot", &DataObject::Null, None, None)
            .expect("second query");
        assert_eq!(
            second[0].get_path("CODE").expect("CODE"),
            DataObject::Scalar(Value::Varchar(Some("A".into())))
        );
        assert_eq!(
            second[0].get_path("LABEL").expect("LABEL"),
            DataObject::Scalar(Value::Varchar(Some("first".into())))
        );
        // nothing of the first shape leaks into the remapped rows
        assert_eq!(second[0].get_path("ID").expect("stale column"), DataObject::Null);
    }

    #[test]
    fn skip_and_max_window_the_first_result_set() {
        let store = MockStore::new();
        store.on_query(
            "SELECT n FROM numbers",
            vec![col("N", ValueKind::Int64)],
            (0..6).map(|n| vec![Value::Int64(Some(n))]).collect(),
        );
        let mut mapper = SqlMapper::new();
        query_statement(
            &mut mapper,
            "numbers",
            "SELECT n FROM numbers",
            ResultMap::auto("numbers-auto", ResultTarget::Map, false, handler()),
        );
        let mut session = Session::new();
        let mut conn = store.connection();

        let list = mapper
            .query_for_list(
                &mut session,
                &mut conn,
                "numbers",
                &DataObject::Null,
                Some(2),
                Some(3),
            )
            .expect("query");
        let values: Vec<DataObject> = list
            .iter()
            .map(|row| row.get_path("N").expect("N"))
            .collect();
        assert_eq!(
            values,
            vec![
                DataObject::Scalar(Value::Int64(Some(2))),
                DataObject::Scalar(Value::Int64(Some(3))),
                DataObject::Scalar(Value::Int64(Some(4))),
            ]
        );
    }

    #[test]
    fn query_for_object_rejects_multiple_rows() {
        let store = MockStore::new();
        store.on_query(
            "SELECT n FROM numbers",
            vec![col("N", ValueKind::Int64)],
            vec![vec![Value::Int64(Some(1))], vec![Value::Int64(Some(2))]],
        );
        store.on_query("SELECT n FROM empty", vec![col("N", ValueKind::Int64)], vec![]);
        let mut mapper = SqlMapper::new();
        query_statement(
            &mut mapper,
            "numbers",
            "SELECT n FROM numbers",
            ResultMap::auto("numbers-auto", ResultTarget::Map, false, handler()),
        );
        query_statement(
            &mut mapper,
            "nothing",
            "SELECT n FROM empty",
            ResultMap::auto("nothing-auto", ResultTarget::Map, false, handler()),
        );
        let mut session = Session::new();
        let mut conn = store.connection();

        let empty = mapper
            .query_for_object(&mut session, &mut conn, "nothing", &DataObject::Null)
            .expect("empty query");
        assert_eq!(empty, DataObject::Null);

        let error = mapper
            .query_for_object(&mut session, &mut conn, "numbers", &DataObject::Null)
            .expect_err("two rows");
        assert!(error.to_string().contains("at most one"));
    }

    #[test]
    fn multiple_result_sets_map_through_their_declared_maps() {
        let store = MockStore::new();
        store.on_results(
            "SELECT accounts; SELECT orders",
            vec![
                // interleaved counts are protocol noise, not result sets
                MockResult::Count(0),
                MockResult::Rows {
                    columns: vec![col("NAME", ValueKind::Varchar)],
                    rows: vec![vec![Value::Varchar(Some("ada".into()))]],
                },
                MockResult::Count(0),
                MockResult::Rows {
                    columns: vec![col("CODE", ValueKind::Varchar)],
                    rows: vec![
                        vec![Value::Varchar(Some("A".into()))],
                        vec![Value::Varchar(Some("B".into()))],
                    ],
                },
            ],
        );
        let source = SqlSource::substitution("SELECT accounts; SELECT orders");
        let statement = MappedStatement::new("both", source)
            .with_result_map(Arc::new(ResultMap::auto(
                "accounts-auto",
                ResultTarget::Map,
                false,
                handler(),
            )))
            .with_additional_result_map(Arc::new(ResultMap::auto(
                "orders-auto",
                ResultTarget::Map,
                false,
                handler(),
            )));
        let mut mapper = SqlMapper::new();
        mapper.register(statement).expect("register");
        let mut session = Session::new();
        let mut conn = store.connection();

        let sets = mapper
            .query_for_multiple(&mut session, &mut conn, "both", &DataObject::Null)
            .expect("query");
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].len(), 1);
        assert_eq!(sets[1].len(), 2);
        assert_eq!(
            sets[1][1].get_path("CODE").expect("CODE"),
            DataObject::Scalar(Value::Varchar(Some("B".into())))
        );
    }
}
