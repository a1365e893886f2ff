use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiController {
    Player,
    HostileEnemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumableTemplate {
    Healing { amount: i32 },
    Lightning { amount: i32 },
    Fireball { amount: i32, radius: i32 },
}

impl ConsumableTemplate {
    /// Whether using the item needs a target cell chosen first.
    pub fn needs_target(&self) -> bool {
        !matches!(self, ConsumableTemplate::Healing { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorTemplate {
    pub max_hp: i32,
    pub power: i32,
    pub defense: i32,
    pub fov_radius: i32,
    pub controller: Option<AiController>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemTemplate {
    pub consumable: Option<ConsumableTemplate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateKind {
    Actor(ActorTemplate),
    Item(ItemTemplate),
}

#[derive(Debug, Clone)]
pub struct EntityTemplate {
    pub id: TemplateId,
    pub def_name: String,
    pub blocks_movement: bool,
    pub kind: TemplateKind,
}

impl EntityTemplate {
    pub fn actor(&self) -> Option<&ActorTemplate> {
        match &self.kind {
            TemplateKind::Actor(actor) => Some(actor),
            TemplateKind::Item(_) => None,
        }
    }

    pub fn item(&self) -> Option<&ItemTemplate> {
        match &self.kind {
            TemplateKind::Item(item) => Some(item),
            TemplateKind::Actor(_) => None,
        }
    }
}

/// Spawnable entity templates, looked up by `defName`.
#[derive(Debug, Default, Clone)]
pub struct TemplateDatabase {
    templates: Vec<EntityTemplate>,
    ids_by_name: HashMap<String, TemplateId>,
}

impl TemplateDatabase {
    pub(crate) fn from_templates(mut templates: Vec<EntityTemplate>) -> Self {
        let mut ids_by_name = HashMap::with_capacity(templates.len());
        for (idx, template) in templates.iter_mut().enumerate() {
            let id = TemplateId(idx as u32);
            template.id = id;
            ids_by_name.insert(template.def_name.clone(), id);
        }
        Self {
            templates,
            ids_by_name,
        }
    }

    pub fn template_id_by_name(&self, name: &str) -> Option<TemplateId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn template(&self, id: TemplateId) -> Option<&EntityTemplate> {
        self.templates.get(id.0 as usize)
    }

    pub fn template_by_name(&self, name: &str) -> Option<&EntityTemplate> {
        self.template_id_by_name(name)
            .and_then(|id| self.template(id))
    }

    pub fn templates(&self) -> &[EntityTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
