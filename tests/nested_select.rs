#[cfg(test)]
mod tests {
    use rowmap::{
        Bean, BeanBox, ClassDef, ColumnInfo, DataObject, DefaultTypeHandler, ExecContext,
        MappedStatement, MethodDef, NestedSelect, Result, ResultMap, ResultMapping, ResultTarget,
        Session, SqlMapper, SqlSource, Value, ValueKind,
    };
    use rowmap_mock::MockStore;
    use std::{
        any::{Any, TypeId},
        sync::Arc,
    };

    const ACCOUNT_SQL: &str = "SELECT id, owner_id FROM account";
    const OWNER_SQL: &str = "SELECT name FROM person WHERE id = ?";
    const ORDERS_SQL: &str = "SELECT code FROM orders WHERE customer = ?";

    fn col(name: &str, kind: ValueKind) -> ColumnInfo {
        ColumnInfo::new(name, Some(kind))
    }

    fn handler() -> Arc<DefaultTypeHandler> {
        Arc::new(DefaultTypeHandler)
    }

    fn owner_statement(mapper: &mut SqlMapper) {
        let source = SqlSource::parse(
            "SELECT name FROM person WHERE id = #value#",
            mapper.registry().as_ref(),
        )
        .expect("parse");
        mapper
            .register(
                MappedStatement::new("ownerById", source).with_result_map(Arc::new(
                    ResultMap::auto("ownerById-auto", ResultTarget::Map, false, handler()),
                )),
            )
            .expect("register");
    }

    fn account_statement(mapper: &mut SqlMapper, lazy: bool) {
        let mut owner = ResultMapping::new("owner", "OWNER_ID", handler());
        owner.select = Some(NestedSelect {
            statement: "ownerById".to_string(),
            column: "OWNER_ID".to_string(),
            lazy,
        });
        let map = ResultMap::new(
            "account",
            ResultTarget::Map,
            vec![ResultMapping::new("id", "ID", handler()), owner],
        );
        let source = SqlSource::parse(ACCOUNT_SQL, mapper.registry().as_ref()).expect("parse");
        mapper
            .register(MappedStatement::new("accounts", source).with_result_map(Arc::new(map)))
            .expect("register");
    }

    fn script_accounts(store: &MockStore, owner_id: Value) {
        store.on_query(
            ACCOUNT_SQL,
            vec![col("ID", ValueKind::Int64), col("OWNER_ID", ValueKind::Int64)],
            vec![vec![Value::Int64(Some(1)), owner_id]],
        );
    }

    #[test]
    fn eager_select_loads_the_association_inline() {
        let store = MockStore::new();
        script_accounts(&store, Value::Int64(Some(9)));
        store.on_query(
            OWNER_SQL,
            vec![col("NAME", ValueKind::Varchar)],
            vec![vec![Value::Varchar(Some("ada".into()))]],
        );
        let mut mapper = SqlMapper::new();
        owner_statement(&mut mapper);
        account_statement(&mut mapper, false);
        let mut session = Session::new();
        let mut conn = store.connection();

        let account = mapper
            .query_for_object(&mut session, &mut conn, "accounts", &DataObject::Null)
            .expect("query");
        assert_eq!(
            account.get_path("owner.NAME").expect("owner name"),
            DataObject::Scalar(Value::Varchar(Some("ada".into())))
        );
        assert_eq!(store.executions(), vec![ACCOUNT_SQL.to_string(), OWNER_SQL.to_string()]);
    }

    #[test]
    fn null_key_column_skips_the_secondary_statement() {
        let store = MockStore::new();
        script_accounts(&store, Value::Int64(None));
        let mut mapper = SqlMapper::new();
        owner_statement(&mut mapper);
        account_statement(&mut mapper, false);
        let mut session = Session::new();
        let mut conn = store.connection();

        let account = mapper
            .query_for_object(&mut session, &mut conn, "accounts", &DataObject::Null)
            .expect("query");
        assert_eq!(account.get_path("owner").expect("owner"), DataObject::Null);
        assert_eq!(store.executions(), vec![ACCOUNT_SQL.to_string()]);
    }

    #[test]
    fn lazy_select_defers_until_first_access() {
        let store = MockStore::new();
        script_accounts(&store, Value::Int64(Some(9)));
        store.on_query(
            OWNER_SQL,
            vec![col("NAME", ValueKind::Varchar)],
            vec![vec![Value::Varchar(Some("ada".into()))]],
        );
        let mut mapper = SqlMapper::new();
        owner_statement(&mut mapper);
        account_statement(&mut mapper, true);
        let mut session = Session::new();
        let mut conn = store.connection();

        let account = mapper
            .query_for_object(&mut session, &mut conn, "accounts", &DataObject::Null)
            .expect("query");
        let DataObject::Deferred(cell) = account.get_path("owner").expect("owner") else {
            panic!("expected a deferred association");
        };
        assert!(!cell.is_resolved());
        assert_eq!(store.executions(), vec![ACCOUNT_SQL.to_string()]);

        let mut ctx = ExecContext {
            session: &mut session,
            conn: &mut conn,
            mapper: &mapper,
        };
        let owner = cell.get(&mut ctx).expect("resolve");
        assert_eq!(
            owner.get_path("NAME").expect("NAME"),
            DataObject::Scalar(Value::Varchar(Some("ada".into())))
        );
        assert!(cell.is_resolved());

        // a second read comes from the cell, not the store
        cell.get(&mut ctx).expect("cached read");
        assert_eq!(store.executions().len(), 2);
    }

    #[test]
    fn lazy_resolution_of_a_missing_row_yields_an_empty_object() {
        let store = MockStore::new();
        script_accounts(&store, Value::Int64(Some(9)));
        store.on_query(OWNER_SQL, vec![col("NAME", ValueKind::Varchar)], vec![]);
        let mut mapper = SqlMapper::new();
        owner_statement(&mut mapper);
        account_statement(&mut mapper, true);
        let mut session = Session::new();
        let mut conn = store.connection();

        let account = mapper
            .query_for_object(&mut session, &mut conn, "accounts", &DataObject::Null)
            .expect("query");
        let DataObject::Deferred(cell) = account.get_path("owner").expect("owner") else {
            panic!("expected a deferred association");
        };
        let mut ctx = ExecContext {
            session: &mut session,
            conn: &mut conn,
            mapper: &mapper,
        };
        let owner = cell.get(&mut ctx).expect("resolve");
        assert_eq!(owner, DataObject::Map(Default::default()));
    }

    // Bean with a list property: the select fills a collection eagerly.

    #[derive(Debug, Clone, Default)]
    struct Customer {
        id: i64,
        orders: Vec<DataObject>,
    }

    fn customer(bean: &dyn Bean) -> &Customer {
        bean.as_any().downcast_ref().expect("Customer bean")
    }

    fn customer_mut(bean: &mut dyn Bean) -> &mut Customer {
        bean.as_any_mut().downcast_mut().expect("Customer bean")
    }

    fn get_id(bean: &dyn Bean) -> DataObject {
        DataObject::Scalar(Value::Int64(Some(customer(bean).id)))
    }

    fn set_id(bean: &mut dyn Bean, value: DataObject) -> Result<()> {
        if let DataObject::Scalar(Value::Int64(Some(id))) = value {
            customer_mut(bean).id = id;
        }
        Ok(())
    }

    fn get_orders(bean: &dyn Bean) -> DataObject {
        DataObject::List(customer(bean).orders.clone())
    }

    fn set_orders(bean: &mut dyn Bean, value: DataObject) -> Result<()> {
        if let DataObject::List(orders) = value {
            customer_mut(bean).orders = orders;
        }
        Ok(())
    }

    static CUSTOMER_DEF: ClassDef = ClassDef {
        name: "Customer",
        type_id: || TypeId::of::<Customer>(),
        parent: None,
        constructor: Some(|| Box::new(Customer::default()) as BeanBox),
        methods: &[
            MethodDef::getter("getId", ValueKind::Int64, get_id),
            MethodDef::setter("setId", ValueKind::Int64, set_id),
            MethodDef::getter("getOrders", ValueKind::List, get_orders),
            MethodDef::setter("setOrders", ValueKind::List, set_orders),
        ],
        fields: &[],
    };

    impl Bean for Customer {
        fn class_def(&self) -> &'static ClassDef {
            &CUSTOMER_DEF
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
    fn list_typed_property_loads_the_whole_collection() {
        let store = MockStore::new();
        store.on_query(
            "SELECT id FROM customer",
            vec![col("ID", ValueKind::Int64)],
            vec![vec![Value::Int64(Some(3))]],
        );
        store.on_query(
            ORDERS_SQL,
            vec![col("CODE", ValueKind::Varchar)],
            vec![
                vec![Value::Varchar(Some("A".into()))],
                vec![Value::Varchar(Some("B".into()))],
            ],
        );
        let mut mapper = SqlMapper::new();
        let orders_source = SqlSource::parse(
            "SELECT code FROM orders WHERE customer = #value#",
            mapper.registry().as_ref(),
        )
        .expect("parse");
        mapper
            .register(
                MappedStatement::new("ordersFor", orders_source).with_result_map(Arc::new(
                    ResultMap::auto("ordersFor-auto", ResultTarget::Map, false, handler()),
                )),
            )
            .expect("register");
        let mut orders = ResultMapping::new("orders", "ID", handler());
        orders.select = Some(NestedSelect {
            statement: "ordersFor".to_string(),
            column: "ID".to_string(),
            lazy: false,
        });
        let map = ResultMap::new(
            "customer",
            ResultTarget::Bean(&CUSTOMER_DEF),
            vec![ResultMapping::new("id", "ID", handler()), orders],
        );
        let source =
            SqlSource::parse("SELECT id FROM customer", mapper.registry().as_ref()).expect("parse");
        mapper
            .register(MappedStatement::new("customers", source).with_result_map(Arc::new(map)))
            .expect("register");
        let mut session = Session::new();
        let mut conn = store.connection();

        let found = mapper
            .query_for_object(&mut session, &mut conn, "customers", &DataObject::Null)
            .expect("query");
        assert_eq!(
            found.get_path("orders[0].CODE").expect("first order"),
            DataObject::Scalar(Value::Varchar(Some("A".into())))
        );
        assert_eq!(
            found.get_path("orders[1].CODE").expect("second order"),
            DataObject::Scalar(Value::Varchar(Some("B".into())))
        );
    }
}
