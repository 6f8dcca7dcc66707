// used for persistence
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::debug;

use crate::catalog::Catalog;
use crate::datatype::{AttributeMap, Value};
use crate::error::{DefaulterError, Result};
use crate::model::{Instance, Schema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

const SCHEMA: &str = "
    create table if not exists Record (
        Record_Identity integer not null,
        Model text not null,
        constraint referenceable_Record_Identity primary key (
            Record_Identity
        )
    );
    create table if not exists Attribute (
        Record_Identity integer not null,
        Attribute text not null,
        AttributeValue null,
        ValueType text not null,
        constraint Attribute_of_Record foreign key (
            Record_Identity
        ) references Record(Record_Identity),
        constraint referenceable_Attribute primary key (
            Record_Identity,
            Attribute
        )
    );
";

/// Stores records of any schema as one row per record plus one typed row per column.
///
/// Records read back go through [`Instance::load`], so defaults that disallow nil
/// are enforced on every reload.
pub struct Persistor {
    db: Connection,
    mode: PersistenceMode,
}

impl Persistor {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let db = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        db.execute_batch(SCHEMA)?;
        Ok(Self { db, mode })
    }
    pub fn mode(&self) -> &PersistenceMode {
        &self.mode
    }
    /// Inserts a new record with all of its columns, or writes the changed columns
    /// of a persisted one. Returns the record's identity.
    pub fn save(&mut self, instance: &mut Instance) -> Result<i64> {
        let model = instance.schema().name().to_string();
        let tx = self.db.transaction()?;
        let (id, written): (i64, Vec<String>) = match instance.id().filter(|_| instance.is_persisted()) {
            Some(id) => (id, instance.changed().iter().map(|s| s.to_string()).collect()),
            None => {
                tx.execute("insert into Record (Model) values (?1)", params![&model])?;
                let columns = instance.schema().columns().map(|c| c.name().to_string()).collect();
                (tx.last_insert_rowid(), columns)
            }
        };
        {
            let mut upsert = tx.prepare_cached(
                "
                insert into Attribute (
                    Record_Identity,
                    Attribute,
                    AttributeValue,
                    ValueType
                ) values (?1, ?2, ?3, ?4)
                on conflict (Record_Identity, Attribute) do update set
                    AttributeValue = excluded.AttributeValue,
                    ValueType = excluded.ValueType
            ",
            )?;
            for name in &written {
                let value = instance.attributes().get(name).cloned().unwrap_or_default();
                upsert.execute(params![id, name, &value, value.data_type()])?;
            }
        }
        tx.commit()?;
        debug!(model = %model, id, attributes = written.len(), "record saved");
        instance.mark_persisted(id);
        Ok(id)
    }
    /// Assigns a single attribute and saves the record right away.
    pub fn update_attribute(
        &mut self,
        instance: &mut Instance,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        instance.set(name, value)?;
        self.save(instance)?;
        Ok(())
    }
    pub fn find(&self, catalog: &Catalog, schema: &Arc<Schema>, id: i64) -> Result<Instance> {
        let model: Option<String> = self
            .db
            .query_row(
                "select Model from Record where Record_Identity = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        if model.as_deref() != Some(schema.name()) {
            return Err(DefaulterError::RecordNotFound {
                model: schema.name().to_string(),
                id,
            });
        }
        let stored = self.stored_attributes(id)?;
        Instance::load(catalog, schema, id, stored)
    }
    /// The first record of `schema` whose stored `attribute` equals `value`.
    pub fn find_by(
        &self,
        catalog: &Catalog,
        schema: &Arc<Schema>,
        attribute: &str,
        value: impl Into<Value>,
    ) -> Result<Option<Instance>> {
        let value = value.into();
        let id: Option<i64> = self
            .db
            .query_row(
                "
                select r.Record_Identity
                    from Record r
                    join Attribute a
                    on a.Record_Identity = r.Record_Identity
                    where r.Model = ?1
                    and a.Attribute = ?2
                    and a.AttributeValue is ?3
                    and a.ValueType = ?4
                    order by r.Record_Identity
                    limit 1
            ",
                params![schema.name(), attribute, &value, value.data_type()],
                |row| row.get(0),
            )
            .optional()?;
        id.map(|id| self.find(catalog, schema, id)).transpose()
    }
    pub fn first(&self, catalog: &Catalog, schema: &Arc<Schema>) -> Result<Option<Instance>> {
        let id: Option<i64> = self
            .db
            .query_row(
                "
                select Record_Identity
                    from Record
                    where Model = ?1
                    order by Record_Identity
                    limit 1
            ",
                params![schema.name()],
                |row| row.get(0),
            )
            .optional()?;
        id.map(|id| self.find(catalog, schema, id)).transpose()
    }
    pub fn count(&self, model: &str) -> Result<usize> {
        let count: i64 = self.db.query_row(
            "select count(*) from Record where Model = ?1",
            params![model],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|e| DefaulterError::DataCorruption {
            message: e.to_string(),
        })
    }
    fn stored_attributes(&self, id: i64) -> Result<AttributeMap> {
        let mut statement = self.db.prepare_cached(
            "
            select Attribute, AttributeValue, ValueType
                from Attribute
                where Record_Identity = ?1
        ",
        )?;
        let mut rows = statement.query(params![id])?;
        let mut stored = AttributeMap::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let data_type: String = row.get(2)?;
            let value = Value::convert(row.get_ref(1)?, &data_type)?;
            stored.insert(name, value);
        }
        Ok(stored)
    }
}
