use anyhow::{bail, Context, Result};
use crud_engine::{CollectionRegistry, GeneratorOptions, SchemaOperation};
use serde_json::{Map, Value};

/// Prints the generated schemas of one definition file, either every
/// operation or the single one named on the command line.
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: crud-schemas <definition.json> [operation]");
    };
    let operation = args
        .next()
        .map(|name| SchemaOperation::parse(&name).with_context(|| format!("unknown operation {}", name)))
        .transpose()?;

    let content = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let definition: Value =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path))?;
    let registry = CollectionRegistry::from_definitions(vec![definition], GeneratorOptions::default())
        .with_context(|| format!("loading {}", path))?;

    let mut output = Map::new();
    for collection in registry.iter() {
        let operations = match operation {
            Some(op) => vec![op],
            None => SchemaOperation::ALL.to_vec(),
        };
        let mut schemas = Map::new();
        for op in operations {
            let schema = collection
                .generator
                .generate(op)
                .to_value()
                .with_context(|| format!("serializing {} schemas of {}", op, collection.model.name))?;
            schemas.insert(op.to_string(), schema);
        }
        output.insert(collection.model.name.clone(), Value::Object(schemas));
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
