//! Bilingual template catalogue and renderer.
//!
//! Templates are the single source of truth for message content on every
//! channel, including in-app. Each template carries French and English
//! variants; a missing locale variant falls back to French rather than
//! failing the render. A missing interpolation value is an error: callers
//! must supply complete payloads, silent empty text is never emitted.
//!
//! Rendering shapes per channel:
//!
//! - SMS / WhatsApp: compact body only, capped at the channel limit.
//! - Email: subject + full body.
//! - Push / In-app: short title + capped body.

use std::collections::{BTreeMap, HashMap};

use crate::channel::{truncate_for, Channel};
use crate::locale::Locale;

/// Error type for template resolution and rendering.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// No template is registered under the requested key. Rejected before
    /// any delivery task is created.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// The payload is missing a value the template interpolates.
    #[error("Template '{key}' is missing payload value '{placeholder}'")]
    MissingValue { key: String, placeholder: String },
}

/// Subject/body pair produced for one (template, locale, channel) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    /// Present for subject-bearing channels (email, push, in-app).
    pub subject: Option<String>,
    pub body: String,
}

/// Localized text for one template in one language.
#[derive(Debug, Clone)]
pub struct TemplateText {
    /// Short title, used as email subject and push/in-app title.
    pub title: String,
    /// Full body, used for email.
    pub body: String,
    /// Compact one-liner for SMS/WhatsApp. Falls back to `body` when not
    /// set.
    pub compact: Option<String>,
}

/// One template with its per-locale variants.
#[derive(Debug, Clone, Default)]
pub struct Template {
    variants: HashMap<Locale, TemplateText>,
}

impl Template {
    /// Pick the variant for `locale`, falling back to [`Locale::FALLBACK`].
    fn variant(&self, locale: Locale) -> Option<&TemplateText> {
        self.variants
            .get(&locale)
            .or_else(|| self.variants.get(&Locale::FALLBACK))
            .or_else(|| self.variants.values().next())
    }
}

/// The registry of templates, keyed by dotted template key
/// (e.g. `grade.new`).
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: HashMap<String, Template>,
}

impl TemplateCatalog {
    /// An empty catalogue. Most deployments start from
    /// [`TemplateCatalog::builtin`] instead.
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Whether a template is registered under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    /// Validate that `key` resolves, without rendering.
    pub fn check_key(&self, key: &str) -> Result<(), TemplateError> {
        if self.contains(key) {
            Ok(())
        } else {
            Err(TemplateError::NotFound(key.to_string()))
        }
    }

    /// Register (or replace) a localized variant for `key`.
    pub fn register(&mut self, key: impl Into<String>, locale: Locale, text: TemplateText) {
        self.templates
            .entry(key.into())
            .or_default()
            .variants
            .insert(locale, text);
    }

    /// Render a template for one channel and locale.
    ///
    /// Interpolates `{placeholder}` markers from `payload`. Returns
    /// [`TemplateError::NotFound`] for an unknown key and
    /// [`TemplateError::MissingValue`] when the payload lacks a referenced
    /// value.
    pub fn render(
        &self,
        key: &str,
        locale: Locale,
        channel: Channel,
        payload: &BTreeMap<String, String>,
    ) -> Result<RenderedContent, TemplateError> {
        let template = self
            .templates
            .get(key)
            .ok_or_else(|| TemplateError::NotFound(key.to_string()))?;
        let text = template
            .variant(locale)
            .ok_or_else(|| TemplateError::NotFound(key.to_string()))?;

        let render = |raw: &str| interpolate(key, raw, payload);

        match channel {
            Channel::Sms | Channel::Whatsapp => {
                let body = render(text.compact.as_deref().unwrap_or(&text.body))?;
                Ok(RenderedContent {
                    subject: None,
                    body: truncate_for(channel, &body),
                })
            }
            Channel::Email => Ok(RenderedContent {
                subject: Some(render(&text.title)?),
                body: render(&text.body)?,
            }),
            Channel::Push | Channel::InApp => {
                let body = render(text.compact.as_deref().unwrap_or(&text.body))?;
                Ok(RenderedContent {
                    subject: Some(render(&text.title)?),
                    body: truncate_for(channel, &body),
                })
            }
        }
    }

    /// The built-in EDUCAFRIC catalogue: grades, attendance, fees,
    /// geolocation, emergencies, and platform notices, in French and
    /// English.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();

        let mut add = |key: &str, en: (&str, &str, Option<&str>), fr: (&str, &str, Option<&str>)| {
            for (locale, (title, body, compact)) in [(Locale::En, en), (Locale::Fr, fr)] {
                catalog.register(
                    key,
                    locale,
                    TemplateText {
                        title: title.to_string(),
                        body: body.to_string(),
                        compact: compact.map(str::to_string),
                    },
                );
            }
        };

        add(
            "grade.new",
            (
                "New grade for {studentName}",
                "A new grade was recorded for {studentName}.\nSubject: {subject}\nGrade: {grade}\n\nView the full report in the Educafric app.",
                Some("{studentName}: {subject} grade {grade}. Well done!"),
            ),
            (
                "Nouvelle note pour {studentName}",
                "Une nouvelle note a été enregistrée pour {studentName}.\nMatière: {subject}\nNote: {grade}\n\nConsultez le rapport complet dans l'application Educafric.",
                Some("{studentName}: note {subject} {grade}. Bravo!"),
            ),
        );
        add(
            "grade.low",
            (
                "Low grade alert for {studentName}",
                "{studentName} received a low grade in {subject}: {grade}.\nPlease contact the teacher to discuss support options.",
                Some("{studentName}: {subject} {grade}. Needs support. Contact teacher."),
            ),
            (
                "Alerte note faible pour {studentName}",
                "{studentName} a reçu une note faible en {subject}: {grade}.\nVeuillez contacter l'enseignant pour discuter d'un accompagnement.",
                Some("{studentName}: {subject} {grade}. Besoin d'aide. Contactez prof."),
            ),
        );
        add(
            "attendance.absence",
            (
                "Absence: {studentName}",
                "{studentName} was marked absent on {date}.\nIf this absence is unexpected, please contact the school.",
                Some("{studentName} absent {date}. Contact school if needed."),
            ),
            (
                "Absence: {studentName}",
                "{studentName} a été marqué absent le {date}.\nSi cette absence est inattendue, veuillez contacter l'école.",
                Some("{studentName} absent {date}. Contactez l'école si nécessaire."),
            ),
        );
        add(
            "attendance.late",
            (
                "Late arrival: {studentName}",
                "{studentName} arrived late at {time}.",
                None,
            ),
            (
                "Retard: {studentName}",
                "{studentName} est arrivé en retard à {time}.",
                None,
            ),
        );
        add(
            "fees.due",
            (
                "School fees due for {studentName}",
                "School fees of {amount} for {studentName} are due on {dueDate}.\nYou can pay directly in the Educafric app.",
                Some("{studentName}: School fees {amount} due {dueDate}. Pay via app."),
            ),
            (
                "Frais de scolarité dus pour {studentName}",
                "Les frais de scolarité de {amount} pour {studentName} sont dus le {dueDate}.\nVous pouvez payer directement dans l'application Educafric.",
                Some("{studentName}: Frais {amount} dus {dueDate}. Payez via l'app."),
            ),
        );
        add(
            "payment.confirmed",
            (
                "Payment received",
                "Payment of {amount} for {studentName} was received.\nReference: {reference}\nThank you!",
                Some("{studentName}: Payment {amount} received. Ref: {reference}. Thank you!"),
            ),
            (
                "Paiement reçu",
                "Le paiement de {amount} pour {studentName} a été reçu.\nRéférence: {reference}\nMerci!",
                Some("{studentName}: Paiement {amount} reçu. Réf: {reference}. Merci!"),
            ),
        );
        add(
            "zone.entry",
            (
                "Safe zone entry",
                "{studentName} entered {zoneName} at {time}. Safe arrival confirmed.",
                None,
            ),
            (
                "Entrée en zone",
                "{studentName} est arrivé à {zoneName} à {time}. Arrivée confirmée.",
                None,
            ),
        );
        add(
            "zone.exit",
            (
                "Safe zone exit",
                "{studentName} left {zoneName} at {time}. Track location in the app.",
                None,
            ),
            (
                "Sortie de zone",
                "{studentName} a quitté {zoneName} à {time}. Suivez sa position dans l'app.",
                None,
            ),
        );
        add(
            "device.low_battery",
            (
                "Low battery",
                "The {deviceType} of {studentName} is at {batteryLevel}% battery. Please charge the device.",
                Some("{studentName}'s {deviceType} battery: {batteryLevel}%. Please charge."),
            ),
            (
                "Batterie faible",
                "Le {deviceType} de {studentName} est à {batteryLevel}% de batterie. Veuillez recharger l'appareil.",
                Some("Batterie {deviceType} de {studentName}: {batteryLevel}%. Rechargez l'appareil."),
            ),
        );
        add(
            "emergency.alert",
            (
                "URGENT: {personName}",
                "URGENT: {personName} - {situation}. Contact the school immediately.",
                None,
            ),
            (
                "URGENT: {personName}",
                "URGENT: {personName} - {situation}. Contactez l'école immédiatement.",
                None,
            ),
        );
        add(
            "emergency.sos",
            (
                "SOS: {studentName}",
                "SOS: {studentName} needs help at {address} ({coordinates}). Contact emergency services.",
                None,
            ),
            (
                "SOS: {studentName}",
                "SOS: {studentName} a besoin d'aide à {address} ({coordinates}). Contactez les secours.",
                None,
            ),
        );
        add(
            "school.announcement",
            (
                "School announcement",
                "School: {title} - {date}. Check the app for details.",
                None,
            ),
            (
                "Annonce de l'école",
                "École: {title} - {date}. Vérifiez l'app pour les détails.",
                None,
            ),
        );
        add(
            "homework.reminder",
            (
                "Homework reminder",
                "{studentName}: {subject} homework due {dueDate}. Check the app.",
                None,
            ),
            (
                "Rappel de devoir",
                "{studentName}: Devoir {subject} pour {dueDate}. Voir l'app.",
                None,
            ),
        );
        add(
            "auth.password_reset",
            (
                "Password reset code",
                "Your Educafric password reset code: {code}. Valid for 10 minutes.",
                None,
            ),
            (
                "Code de réinitialisation",
                "Votre code Educafric: {code}. Valide 10 minutes.",
                None,
            ),
        );

        catalog
    }
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Replace `{placeholder}` markers in `raw` with payload values.
fn interpolate(
    key: &str,
    raw: &str,
    payload: &BTreeMap<String, String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices();

    while let Some((start, c)) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut end = None;
        for (i, c) in chars.by_ref() {
            if c == '}' {
                end = Some(i);
                break;
            }
        }
        let Some(end) = end else {
            // Unbalanced brace: emit literally.
            out.push_str(&raw[start..]);
            break;
        };
        let placeholder = &raw[start + 1..end];
        match payload.get(placeholder) {
            Some(value) => out.push_str(value),
            None => {
                return Err(TemplateError::MissingValue {
                    key: key.to_string(),
                    placeholder: placeholder.to_string(),
                })
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn payload(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unknown_key_is_not_found() {
        let catalog = TemplateCatalog::builtin();
        assert_matches!(
            catalog.render("grade.unknown", Locale::En, Channel::Sms, &BTreeMap::new()),
            Err(TemplateError::NotFound(_))
        );
        assert_matches!(
            catalog.check_key("grade.unknown"),
            Err(TemplateError::NotFound(_))
        );
    }

    #[test]
    fn renders_grade_sms_in_english() {
        let catalog = TemplateCatalog::builtin();
        let content = catalog
            .render(
                "grade.new",
                Locale::En,
                Channel::Sms,
                &payload(&[
                    ("studentName", "Jean"),
                    ("subject", "Math"),
                    ("grade", "16/20"),
                ]),
            )
            .unwrap();
        assert_eq!(content.subject, None);
        assert_eq!(content.body, "Jean: Math grade 16/20. Well done!");
    }

    #[test]
    fn renders_email_with_subject() {
        let catalog = TemplateCatalog::builtin();
        let content = catalog
            .render(
                "grade.new",
                Locale::Fr,
                Channel::Email,
                &payload(&[
                    ("studentName", "Jean"),
                    ("subject", "Math"),
                    ("grade", "16/20"),
                ]),
            )
            .unwrap();
        assert_eq!(content.subject.as_deref(), Some("Nouvelle note pour Jean"));
        assert!(content.body.contains("Matière: Math"));
    }

    #[test]
    fn push_carries_title_and_body() {
        let catalog = TemplateCatalog::builtin();
        let content = catalog
            .render(
                "zone.exit",
                Locale::En,
                Channel::Push,
                &payload(&[
                    ("studentName", "Ama"),
                    ("zoneName", "Home"),
                    ("time", "17:45"),
                ]),
            )
            .unwrap();
        assert_eq!(content.subject.as_deref(), Some("Safe zone exit"));
        assert!(content.body.starts_with("Ama left Home at 17:45"));
    }

    #[test]
    fn missing_payload_value_fails_render() {
        let catalog = TemplateCatalog::builtin();
        let err = catalog
            .render(
                "grade.new",
                Locale::En,
                Channel::Sms,
                &payload(&[("studentName", "Jean")]),
            )
            .unwrap_err();
        assert_matches!(
            err,
            TemplateError::MissingValue { ref placeholder, .. } if placeholder == "subject"
        );
    }

    #[test]
    fn missing_locale_falls_back_to_french() {
        let mut catalog = TemplateCatalog::empty();
        catalog.register(
            "custom.note",
            Locale::Fr,
            TemplateText {
                title: "Titre".to_string(),
                body: "Bonjour {name}".to_string(),
                compact: None,
            },
        );
        let content = catalog
            .render(
                "custom.note",
                Locale::En,
                Channel::Email,
                &payload(&[("name", "Awa")]),
            )
            .unwrap();
        assert_eq!(content.body, "Bonjour Awa");
    }

    #[test]
    fn sms_body_is_capped_at_one_segment() {
        let mut catalog = TemplateCatalog::empty();
        catalog.register(
            "long.note",
            Locale::Fr,
            TemplateText {
                title: "t".to_string(),
                body: "x".repeat(300),
                compact: None,
            },
        );
        let content = catalog
            .render("long.note", Locale::Fr, Channel::Sms, &BTreeMap::new())
            .unwrap();
        assert_eq!(content.body.chars().count(), 160);
        assert!(content.body.ends_with('…'));
    }

    #[test]
    fn unbalanced_brace_is_literal() {
        let mut catalog = TemplateCatalog::empty();
        catalog.register(
            "odd.note",
            Locale::Fr,
            TemplateText {
                title: "t".to_string(),
                body: "value {unclosed".to_string(),
                compact: None,
            },
        );
        let content = catalog
            .render("odd.note", Locale::Fr, Channel::Sms, &BTreeMap::new())
            .unwrap();
        assert_eq!(content.body, "value {unclosed");
    }

    #[test]
    fn builtin_covers_all_documented_keys() {
        let catalog = TemplateCatalog::builtin();
        for key in [
            "grade.new",
            "grade.low",
            "attendance.absence",
            "attendance.late",
            "fees.due",
            "payment.confirmed",
            "zone.entry",
            "zone.exit",
            "device.low_battery",
            "emergency.alert",
            "emergency.sos",
            "school.announcement",
            "homework.reminder",
            "auth.password_reset",
        ] {
            assert!(catalog.contains(key), "missing builtin template {key}");
        }
    }
}
