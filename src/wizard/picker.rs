use std::cmp::Ordering;

use utoipa::ToSchema;
use uuid::Uuid;

use super::WizardError;
use crate::context::OperatorContext;
use crate::data::church::EstablishmentRef;
use crate::data::class::Class;
use crate::data::lesson::Lesson;
use crate::util::compare_names;

/// Classes of one establishment, as listed by the picker.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub establishment: EstablishmentRef,
    pub classes: Vec<Class>,
}

fn establishment_order(a: &EstablishmentRef, b: &EstablishmentRef) -> Ordering {
    b.is_headquarters()
        .cmp(&a.is_headquarters())
        .then_with(|| compare_names(&a.name, &b.name))
        .then_with(|| a.id.cmp(&b.id))
}

/// Headquarters first, then establishments by name, classes by name inside
/// each group.
pub fn group_classes(mut classes: Vec<Class>) -> Vec<ClassGroup> {
    classes.sort_by(|a, b| {
        establishment_order(&a.establishment, &b.establishment)
            .then_with(|| compare_names(&a.name, &b.name))
    });

    let mut groups: Vec<ClassGroup> = Vec::new();
    for class in classes {
        match groups.last_mut() {
            Some(group) if group.establishment.id == class.establishment.id => {
                group.classes.push(class)
            }
            _ => groups.push(ClassGroup {
                establishment: class.establishment.clone(),
                classes: vec![class],
            }),
        }
    }
    groups
}

/// A lesson together with the classes attendance can be taken for.
#[derive(Debug, Clone)]
pub struct Picker {
    pub lesson: Lesson,
    pub groups: Vec<ClassGroup>,
}

impl Picker {
    pub fn new(lesson: Lesson, classes: Vec<Class>) -> Picker {
        Picker {
            lesson,
            groups: group_classes(classes),
        }
    }

    pub fn find_class(&self, class_id: Uuid) -> Option<&Class> {
        self.groups
            .iter()
            .flat_map(|g| g.classes.iter())
            .find(|c| c.id == class_id)
    }

    pub fn class_count(&self) -> usize {
        self.groups.iter().map(|g| g.classes.len()).sum()
    }
}

/// Reads the lesson and the classes in its establishment scope.
pub async fn load_picker(
    ctx: &OperatorContext<'_>,
    lesson_id: Uuid,
) -> Result<Picker, WizardError> {
    let lesson = ctx
        .run(ctx.store.get_lesson(ctx.owner, lesson_id))
        .await?
        .ok_or_else(|| WizardError::NotFound(format!("lesson {}", lesson_id)))?;

    let scope = lesson.establishment.as_ref().map(|e| e.id);
    let classes = ctx
        .run(ctx.store.query_classes(ctx.owner, scope))
        .await?;

    Ok(Picker::new(lesson, classes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::church::EstablishmentKind;
    use crate::data::class::AgeGroup;

    fn establishment(name: &str, kind: EstablishmentKind) -> EstablishmentRef {
        EstablishmentRef {
            id: Uuid::new_v4(),
            name: name.to_string(),
            kind,
        }
    }

    #[test]
    fn headquarters_come_first() {
        let owner = Uuid::new_v4();
        let hq = establishment("Templo Central", EstablishmentKind::Headquarters);
        let vila = establishment("Vila Nova", EstablishmentKind::Congregation);
        let alto = establishment("Alto da Serra", EstablishmentKind::Congregation);

        let groups = group_classes(vec![
            Class::new(owner, vila.clone(), "Jovens", AgeGroup::Youth),
            Class::new(owner, hq.clone(), "Juniores", AgeGroup::Junior),
            Class::new(owner, alto.clone(), "Adultos", AgeGroup::Adult),
            Class::new(owner, hq.clone(), "adolescentes", AgeGroup::Adolescent),
            Class::new(owner, vila.clone(), "Adultos", AgeGroup::Adult),
        ]);

        let order: Vec<_> = groups
            .iter()
            .map(|g| g.establishment.name.as_str())
            .collect();
        assert_eq!(order, vec!["Templo Central", "Alto da Serra", "Vila Nova"]);

        let hq_classes: Vec<_> = groups[0].classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(hq_classes, vec!["adolescentes", "Juniores"]);
        let vila_classes: Vec<_> = groups[2].classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(vila_classes, vec!["Adultos", "Jovens"]);
    }

    #[test]
    fn no_classes_means_no_groups() {
        assert!(group_classes(vec![]).is_empty());
    }
}
