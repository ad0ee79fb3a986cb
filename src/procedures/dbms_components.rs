//! `dbms.components()` — engine version information.

use super::{ProcedureContext, ProcedureOutput};
use crate::model::Value;
use crate::Result;

pub fn execute(_ctx: &ProcedureContext, _args: &[Value]) -> Result<ProcedureOutput> {
    Ok(ProcedureOutput {
        columns: vec!["name".into(), "versions".into(), "edition".into()],
        rows: vec![vec![
            Value::String("NornicDB".into()),
            Value::List(vec![Value::String(env!("CARGO_PKG_VERSION").into())]),
            Value::String("community".into()),
        ]],
    })
}
