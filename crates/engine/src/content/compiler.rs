use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::debug;

use super::database::{
    ActorTemplate, AiController, ConsumableTemplate, EntityTemplate, ItemTemplate,
    TemplateDatabase, TemplateId, TemplateKind,
};
use super::types::{ContentCompileError, ContentErrorCode, SourceLocation};

const DEFAULT_FOV_RADIUS: i32 = 8;

/// Compiles every `*.xml` file under `content_dir` (sorted by relative path)
/// into one database. A `defName` may appear only once across all files.
pub fn compile_template_database(
    content_dir: &Path,
) -> Result<TemplateDatabase, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut templates = Vec::<EntityTemplate>::new();
    let mut seen = HashSet::<String>::new();
    for xml_file in xml_files {
        let raw = fs::read_to_string(&xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        let parsed = parse_defs_document(&xml_file, &raw)?;
        debug!(file = %xml_file.display(), count = parsed.len(), "template_file_parsed");
        push_unique(&mut templates, &mut seen, parsed, &xml_file)?;
    }

    Ok(TemplateDatabase::from_templates(templates))
}

/// Compiles a single in-memory `<Defs>` document.
pub fn parse_template_database(
    source_name: &str,
    raw: &str,
) -> Result<TemplateDatabase, ContentCompileError> {
    let file_path = PathBuf::from(source_name);
    let parsed = parse_defs_document(&file_path, raw)?;
    let mut templates = Vec::with_capacity(parsed.len());
    let mut seen = HashSet::new();
    push_unique(&mut templates, &mut seen, parsed, &file_path)?;
    Ok(TemplateDatabase::from_templates(templates))
}

fn push_unique(
    templates: &mut Vec<EntityTemplate>,
    seen: &mut HashSet<String>,
    parsed: Vec<EntityTemplate>,
    file_path: &Path,
) -> Result<(), ContentCompileError> {
    for template in parsed {
        if !seen.insert(template.def_name.clone()) {
            return Err(ContentCompileError {
                code: ContentErrorCode::DuplicateDef,
                message: format!(
                    "duplicate EntityDef '{}'; each defName may be defined only once",
                    template.def_name
                ),
                file_path: file_path.to_path_buf(),
                location: None,
            });
        }
        templates.push(template);
    }
    Ok(())
}

struct ParseContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn parsed<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
        expected: &str,
    ) -> Result<T, ContentCompileError> {
        let value = self.required_text(node, field_name)?;
        value.parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field_name} '{value}' is not {expected}"),
                node,
            )
        })
    }

    fn non_negative(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<i32, ContentCompileError> {
        let value = self.parsed::<i32>(node, field_name, "a valid integer")?;
        if value < 0 {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field_name} must be >= 0"),
                node,
            ));
        }
        Ok(value)
    }

    fn missing(&self, node: Node<'_, '_>, field_name: &str, def_name: &str) -> ContentCompileError {
        self.error_at(
            ContentErrorCode::MissingField,
            format!("missing required field <{field_name}> in <EntityDef> '{def_name}'"),
            node,
        )
    }
}

fn parse_defs_document(
    file_path: &Path,
    raw: &str,
) -> Result<Vec<EntityTemplate>, ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = ParseContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    let mut templates = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "EntityDef" {
            return Err(ctx.error_at(
                ContentErrorCode::UnknownDefType,
                format!(
                    "unsupported def type <{}>; only <EntityDef> is recognised",
                    child.tag_name().name()
                ),
                child,
            ));
        }
        templates.push(parse_entity_def(&ctx, child)?);
    }
    Ok(templates)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefKind {
    Actor,
    Item,
}

#[derive(Default)]
struct PendingFields<'a, 'input> {
    def_name: Option<String>,
    kind: Option<DefKind>,
    blocks_movement: Option<bool>,
    max_hp: Option<i32>,
    power: Option<i32>,
    defense: Option<i32>,
    fov_radius: Option<i32>,
    controller: Option<AiController>,
    consumable: Option<(String, Node<'a, 'input>)>,
    amount: Option<i32>,
    radius: Option<i32>,
    actor_only: Vec<Node<'a, 'input>>,
    item_only: Vec<Node<'a, 'input>>,
}

fn parse_entity_def<'a, 'input>(
    ctx: &ParseContext<'_, '_>,
    node: Node<'a, 'input>,
) -> Result<EntityTemplate, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut fields = PendingFields::default();

    for field in node.children().filter(|child| child.is_element()) {
        let field_name = field.tag_name().name().to_string();
        if !seen_fields.insert(field_name.clone()) {
            return Err(ctx.error_at(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <EntityDef>"),
                field,
            ));
        }

        match field_name.as_str() {
            "defName" => fields.def_name = Some(ctx.required_text(field, "defName")?),
            "kind" => {
                let value = ctx.required_text(field, "kind")?;
                fields.kind = Some(match value.as_str() {
                    "Actor" => DefKind::Actor,
                    "Item" => DefKind::Item,
                    _ => {
                        return Err(ctx.error_at(
                            ContentErrorCode::InvalidValue,
                            format!("invalid kind '{value}'; allowed values: Actor, Item"),
                            field,
                        ))
                    }
                });
            }
            "blocksMovement" => {
                fields.blocks_movement =
                    Some(ctx.parsed::<bool>(field, "blocksMovement", "true or false")?);
            }
            "maxHp" => {
                fields.max_hp = Some(ctx.non_negative(field, "maxHp")?);
                fields.actor_only.push(field);
            }
            "power" => {
                fields.power = Some(ctx.non_negative(field, "power")?);
                fields.actor_only.push(field);
            }
            "defense" => {
                fields.defense = Some(ctx.non_negative(field, "defense")?);
                fields.actor_only.push(field);
            }
            "fovRadius" => {
                fields.fov_radius = Some(ctx.non_negative(field, "fovRadius")?);
                fields.actor_only.push(field);
            }
            "controller" => {
                let value = ctx.required_text(field, "controller")?;
                fields.controller = Some(match value.as_str() {
                    "Player" => AiController::Player,
                    "HostileEnemy" => AiController::HostileEnemy,
                    _ => {
                        return Err(ctx.error_at(
                            ContentErrorCode::InvalidValue,
                            format!(
                                "invalid controller '{value}'; allowed values: Player, HostileEnemy"
                            ),
                            field,
                        ))
                    }
                });
                fields.actor_only.push(field);
            }
            "consumable" => {
                fields.consumable = Some((ctx.required_text(field, "consumable")?, field));
                fields.item_only.push(field);
            }
            "amount" => {
                fields.amount = Some(ctx.non_negative(field, "amount")?);
                fields.item_only.push(field);
            }
            "radius" => {
                fields.radius = Some(ctx.non_negative(field, "radius")?);
                fields.item_only.push(field);
            }
            _ => {
                return Err(ctx.error_at(
                    ContentErrorCode::UnknownField,
                    format!("unknown field <{field_name}> in <EntityDef>"),
                    field,
                ))
            }
        }
    }

    let Some(def_name) = fields.def_name.take() else {
        return Err(ctx.error_at(
            ContentErrorCode::MissingField,
            "missing required field <defName> in <EntityDef>".to_string(),
            node,
        ));
    };
    let Some(kind) = fields.kind else {
        return Err(ctx.missing(node, "kind", &def_name));
    };

    let misplaced = match kind {
        DefKind::Actor => fields.item_only.first(),
        DefKind::Item => fields.actor_only.first(),
    };
    if let Some(field) = misplaced {
        return Err(ctx.error_at(
            ContentErrorCode::InvalidValue,
            format!(
                "field <{}> does not apply to {:?} '{}'",
                field.tag_name().name(),
                kind,
                def_name
            ),
            *field,
        ));
    }

    let template_kind = match kind {
        DefKind::Actor => TemplateKind::Actor(ActorTemplate {
            max_hp: fields
                .max_hp
                .ok_or_else(|| ctx.missing(node, "maxHp", &def_name))?,
            power: fields
                .power
                .ok_or_else(|| ctx.missing(node, "power", &def_name))?,
            defense: fields
                .defense
                .ok_or_else(|| ctx.missing(node, "defense", &def_name))?,
            fov_radius: fields.fov_radius.unwrap_or(DEFAULT_FOV_RADIUS),
            controller: fields.controller,
        }),
        DefKind::Item => TemplateKind::Item(ItemTemplate {
            consumable: parse_consumable(ctx, node, &def_name, &fields)?,
        }),
    };

    Ok(EntityTemplate {
        id: TemplateId(0),
        blocks_movement: fields.blocks_movement.unwrap_or(kind == DefKind::Actor),
        def_name,
        kind: template_kind,
    })
}

fn parse_consumable(
    ctx: &ParseContext<'_, '_>,
    node: Node<'_, '_>,
    def_name: &str,
    fields: &PendingFields<'_, '_>,
) -> Result<Option<ConsumableTemplate>, ContentCompileError> {
    let Some((value, field)) = &fields.consumable else {
        return Ok(None);
    };
    let amount = fields
        .amount
        .ok_or_else(|| ctx.missing(node, "amount", def_name))?;
    let consumable = match value.as_str() {
        "Healing" => ConsumableTemplate::Healing { amount },
        "Lightning" => ConsumableTemplate::Lightning { amount },
        "Fireball" => ConsumableTemplate::Fireball {
            amount,
            radius: fields
                .radius
                .ok_or_else(|| ctx.missing(node, "radius", def_name))?,
        },
        _ => {
            return Err(ctx.error_at(
                ContentErrorCode::InvalidValue,
                format!(
                    "invalid consumable '{value}'; allowed values: Healing, Lightning, Fireball"
                ),
                *field,
            ))
        }
    };
    Ok(Some(consumable))
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_key(|path| relative_key(root, path));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML content: {source}"),
        file_path: path,
        location: None,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    const GOBLIN: &str = r#"<EntityDef>
        <defName>Goblin</defName><kind>Actor</kind>
        <maxHp>10</maxHp><power>3</power><defense>0</defense>
        <controller>HostileEnemy</controller>
    </EntityDef>"#;

    #[test]
    fn actor_and_item_templates_compile_with_defaults() {
        let raw = format!(
            r#"<Defs>{GOBLIN}
                <EntityDef><defName>Fireball Scroll</defName><kind>Item</kind>
                    <consumable>Fireball</consumable><amount>12</amount><radius>3</radius>
                </EntityDef>
            </Defs>"#
        );
        let db = parse_template_database("inline.xml", &raw).expect("compile");

        let goblin = db.template_by_name("Goblin").expect("goblin");
        assert!(goblin.blocks_movement);
        let actor = goblin.actor().expect("actor");
        assert_eq!(actor.fov_radius, DEFAULT_FOV_RADIUS);
        assert_eq!(actor.controller, Some(AiController::HostileEnemy));

        let scroll = db.template_by_name("Fireball Scroll").expect("scroll");
        assert!(!scroll.blocks_movement);
        assert_eq!(
            scroll.item().and_then(|item| item.consumable),
            Some(ConsumableTemplate::Fireball {
                amount: 12,
                radius: 3
            })
        );
        assert_eq!(db.template_id_by_name("Fireball Scroll"), Some(TemplateId(1)));
    }

    #[test]
    fn files_compile_in_sorted_relative_path_order() {
        let temp = TempDir::new().expect("temp");
        write_file(
            &temp.path().join("b").join("items.xml"),
            r#"<Defs><EntityDef><defName>Potion</defName><kind>Item</kind></EntityDef></Defs>"#,
        );
        write_file(&temp.path().join("a.xml"), &format!("<Defs>{GOBLIN}</Defs>"));
        write_file(&temp.path().join("notes.txt"), "ignored");

        let db = compile_template_database(temp.path()).expect("compile");
        let names: Vec<&str> = db.templates().iter().map(|t| t.def_name.as_str()).collect();
        assert_eq!(names, vec!["Goblin", "Potion"]);
    }

    #[test]
    fn duplicate_def_name_across_files_errors() {
        let temp = TempDir::new().expect("temp");
        write_file(&temp.path().join("a.xml"), &format!("<Defs>{GOBLIN}</Defs>"));
        write_file(&temp.path().join("b.xml"), &format!("<Defs>{GOBLIN}</Defs>"));

        let err = compile_template_database(temp.path()).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDef);
        assert!(err.file_path.ends_with("b.xml"));
    }

    #[test]
    fn missing_actor_stat_reports_location() {
        let err = parse_template_database(
            "defs.xml",
            r#"<Defs><EntityDef><defName>Orc</defName><kind>Actor</kind><maxHp>5</maxHp><power>2</power></EntityDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::MissingField);
        assert!(err.message.contains("defense"));
        assert!(err.location.is_some());
    }

    #[test]
    fn item_fields_on_actor_are_rejected() {
        let err = parse_template_database(
            "defs.xml",
            r#"<Defs><EntityDef><defName>Orc</defName><kind>Actor</kind><maxHp>5</maxHp><power>2</power><defense>1</defense><amount>4</amount></EntityDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidValue);
        assert!(err.message.contains("<amount>"));
    }

    #[test]
    fn unknown_and_duplicate_fields_error() {
        let unknown = parse_template_database(
            "defs.xml",
            r#"<Defs><EntityDef><defName>a</defName><kind>Item</kind><mood>Happy</mood></EntityDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(unknown.code, ContentErrorCode::UnknownField);

        let duplicate = parse_template_database(
            "defs.xml",
            r#"<Defs><EntityDef><defName>a</defName><defName>b</defName><kind>Item</kind></EntityDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(duplicate.code, ContentErrorCode::DuplicateField);
    }

    #[test]
    fn invalid_values_error() {
        let bad_kind = parse_template_database(
            "defs.xml",
            r#"<Defs><EntityDef><defName>a</defName><kind>Trap</kind></EntityDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(bad_kind.code, ContentErrorCode::InvalidValue);

        let bad_bool = parse_template_database(
            "defs.xml",
            r#"<Defs><EntityDef><defName>a</defName><kind>Item</kind><blocksMovement>maybe</blocksMovement></EntityDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(bad_bool.code, ContentErrorCode::InvalidValue);

        let negative = parse_template_database(
            "defs.xml",
            r#"<Defs><EntityDef><defName>a</defName><kind>Item</kind><consumable>Healing</consumable><amount>-4</amount></EntityDef></Defs>"#,
        )
        .expect_err("err");
        assert_eq!(negative.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn malformed_xml_and_wrong_root_report_codes() {
        let malformed =
            parse_template_database("defs.xml", "<Defs><EntityDef></Defs>").expect_err("err");
        assert_eq!(malformed.code, ContentErrorCode::XmlMalformed);
        assert!(malformed.location.is_some());

        let root = parse_template_database("defs.xml", "<Things/>").expect_err("err");
        assert_eq!(root.code, ContentErrorCode::InvalidRoot);

        let def_type =
            parse_template_database("defs.xml", "<Defs><ThingDef/></Defs>").expect_err("err");
        assert_eq!(def_type.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn missing_content_dir_is_a_read_error() {
        let temp = TempDir::new().expect("temp");
        let err = compile_template_database(&temp.path().join("absent")).expect_err("err");
        assert_eq!(err.code, ContentErrorCode::ReadFile);
    }
}
