use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use mongodb::bson::{doc, oid::ObjectId, Document};
use rand::{seq::SliceRandom, Rng};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    database::{MongoDB, CODES},
    models::{Budget, SavingsGoal, TransactionKind},
    services::{
        budget_service, goal_service,
        llm_client::{CompletionProvider, OpenAiClient},
        transaction_service,
    },
    utils::{
        dates::current_period,
        error::{AppError, AppResult},
        format::format_clp,
    },
};

const CONTEXT_GOALS: i64 = 5;
const MAX_MESSAGE_LEN: usize = 1000;

/// What the user is asking about, first matching pattern wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Spending,
    Savings,
    Goals,
    Budget,
    Advice,
    Greeting,
    Fallback,
}

lazy_static! {
    static ref INTENTS: Vec<(Intent, Regex)> = vec![
        (Intent::Spending, Regex::new(r"gast|cu[aá]nto").expect("valid spending regex")),
        (Intent::Savings, Regex::new(r"ahorr").expect("valid savings regex")),
        (Intent::Goals, Regex::new(r"meta").expect("valid goals regex")),
        (Intent::Budget, Regex::new(r"presupuesto").expect("valid budget regex")),
        (Intent::Advice, Regex::new(r"consejo|ayuda").expect("valid advice regex")),
        (
            Intent::Greeting,
            Regex::new(r"\b(hola|buenas|buenos d[ií]as|saludos|hey)\b").expect("valid greeting regex")
        ),
    ];
}

const TIPS: [&str; 4] = [
    "💡 Consejo del día:\n\nAntes de comprar algo, espera 24 horas. Si aún lo quieres después, \
probablemente lo necesites. Si no, acabas de ahorrar dinero.",
    "💡 Consejo del día:\n\nLa regla 50/30/20:\n• 50% necesidades\n• 30% gustos\n• 20% ahorro\n\n\
¿Qué tal si revisamos cómo está tu distribución actual?",
    "💡 Consejo del día:\n\nAutomatiza tu ahorro. Separa un porcentaje de tus ingresos apenas los \
recibas. Lo que no ves, no lo gastas 🎯",
    "💡 Consejo del día:\n\nCompara precios antes de comprar. Usa cupones siempre que puedas. \
Pequeños ahorros suman grandes resultados 📈",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthTotals {
    pub income: f64,
    pub expenses: f64,
    pub balance: f64,
    pub savings: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalSnapshot {
    pub name: String,
    pub icon: String,
    pub progress: f64,
    pub progress_label: String,
    pub current: f64,
    pub target: f64,
    pub days_since_creation: i64,
}

impl GoalSnapshot {
    pub fn from_goal(goal: &SavingsGoal, now: DateTime<Utc>) -> Self {
        Self {
            name: goal.name.clone(),
            icon: goal.icon.clone(),
            progress: goal.progress(),
            progress_label: goal.progress_label(),
            current: goal.current_amount,
            target: goal.target_amount,
            days_since_creation: goal.days_since_creation(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSnapshot {
    pub usage: f64,
    pub usage_label: String,
    pub total_budget: f64,
    pub total_spent: f64,
}

impl From<&Budget> for BudgetSnapshot {
    fn from(budget: &Budget) -> Self {
        Self {
            usage: budget.usage_value(),
            usage_label: budget.usage_percent(),
            total_budget: budget.total_budget,
            total_spent: budget.total_spent,
        }
    }
}

/// The user's current month as the assistant sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinancialContext {
    pub totals: MonthTotals,
    /// Active goals, best progress first.
    pub goals: Vec<GoalSnapshot>,
    pub budget: Option<BudgetSnapshot>,
    pub available_coupons: u64,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ChatRequest {
    pub mensaje: Option<String>,
}

impl ChatRequest {
    pub fn message(&self) -> AppResult<&str> {
        let message = self
            .mensaje
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AppError::Validation("El mensaje es obligatorio".into()))?;
        if message.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "El mensaje no puede superar {} caracteres",
                MAX_MESSAGE_LEN
            )));
        }
        Ok(message)
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ChatReply {
    pub success: bool,
    pub respuesta: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Alta,
    Media,
    Baja,
}

#[derive(Debug, Clone, Serialize, PartialEq, utoipa::ToSchema)]
pub struct ProactiveAlert {
    pub tipo: String,
    pub urgencia: Urgency,
    pub mensaje: String,
    pub accion: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AlertsReply {
    pub success: bool,
    pub alertas: Vec<ProactiveAlert>,
}

pub fn detect_intent(message: &str) -> Intent {
    let lowered = message.to_lowercase();
    INTENTS
        .iter()
        .find(|(_, pattern)| pattern.is_match(&lowered))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::Fallback)
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

fn spending_reply(totals: &MonthTotals) -> String {
    if totals.balance < 0.0 {
        format!(
            "Este mes has gastado ${} y tus gastos superan tus ingresos por ${} 😟\n\n\
             Te recomiendo:\n\
             1. Revisa las categorías donde más gastas 📊\n\
             2. Usa más cupones de descuento 🎟️\n\
             3. Ajusta tu presupuesto para el próximo mes 💡",
            format_clp(totals.expenses),
            format_clp(totals.balance.abs())
        )
    } else {
        format!(
            "¡Bien hecho! 👏 Este mes has gastado ${} y tienes un balance positivo de ${}\n\n\
             Considera destinar parte de ese balance a tus metas de ahorro 🎯",
            format_clp(totals.expenses),
            format_clp(totals.balance)
        )
    }
}

fn savings_reply(context: &FinancialContext) -> String {
    if context.totals.savings > 0.0 {
        format!(
            "¡Excelente! 🎉 Has ahorrado ${} usando cupones este mes.\n\n\
             Para seguir ahorrando:\n\
             • Revisa diariamente los cupones disponibles\n\
             • Compara precios antes de comprar\n\
             • Establece metas de ahorro claras",
            format_clp(context.totals.savings)
        )
    } else {
        format!(
            "Aún no has usado cupones este mes 🎟️\n\n\
             Tengo {} cupones disponibles para ti. ¡Úsalos para ahorrar en tus próximas compras!",
            context.available_coupons
        )
    }
}

fn goals_reply(goals: &[GoalSnapshot]) -> String {
    let Some(best) = goals.first() else {
        return "No tienes metas de ahorro activas 🎯\n\n\
                Te recomiendo crear al menos una meta. Las personas con metas claras ahorran 40% \
                más que quienes no las tienen.\n\n¿Qué te gustaría lograr? 💭"
            .to_string();
    };

    let lines: Vec<String> = goals
        .iter()
        .map(|g| {
            format!(
                "• {} {}: {}% (${}/${})",
                g.icon,
                g.name,
                g.progress_label,
                format_clp(g.current),
                format_clp(g.target)
            )
        })
        .collect();

    let closing = if best.progress < 30.0 {
        "¡Sigue así! Cada pequeño aporte cuenta 💪"
    } else {
        "¡Vas muy bien! 🚀"
    };

    format!(
        "Tienes {} meta{} activa{} 🎯\n\n{}\n\n{}",
        goals.len(),
        plural(goals.len()),
        plural(goals.len()),
        lines.join("\n"),
        closing
    )
}

fn budget_reply(budget: Option<&BudgetSnapshot>) -> String {
    let Some(budget) = budget else {
        return "No tienes un presupuesto configurado 📊\n\n\
                Crear un presupuesto te ayudará a controlar tus gastos y evitar sorpresas. \
                ¿Quieres que te ayude a crear uno?"
            .to_string();
    };

    if budget.usage > 90.0 {
        format!(
            "⚠️ ¡Alerta! Has usado el {}% de tu presupuesto mensual.\n\n\
             Te quedan ${} para el resto del mes.\n\n\
             Prioriza solo gastos esenciales los próximos días 🛡️",
            budget.usage_label,
            format_clp(budget.total_budget - budget.total_spent)
        )
    } else if budget.usage > 75.0 {
        format!(
            "Has usado el {}% de tu presupuesto 📊\n\n\
             Te estás acercando al límite. Te recomiendo moderar tus gastos el resto del mes 💡",
            budget.usage_label
        )
    } else {
        format!(
            "¡Vas bien! 👍 Has usado el {}% de tu presupuesto mensual.\n\n\
             Sigues dentro del rango saludable. Mantén el control 💪",
            budget.usage_label
        )
    }
}

fn greeting_reply() -> String {
    "¡Hola! 👋 Soy Nubi, tu asistente financiero.\n\n\
     Pregúntame por tus gastos, tus metas o tu presupuesto, o pídeme un consejo 💡"
        .to_string()
}

fn fallback_reply() -> String {
    "Interesante pregunta 🤔\n\n\
     Puedo ayudarte con:\n\
     💰 Ver tus gastos del mes\n\
     🎯 Revisar tus metas de ahorro\n\
     🎟️ Encontrar cupones\n\
     📊 Analizar tu presupuesto\n\
     💡 Darte consejos financieros\n\n\
     ¿Sobre qué tema específico te gustaría hablar?"
        .to_string()
}

/// Templated reply for a message over the snapshot.
pub fn rule_reply<R: Rng + ?Sized>(message: &str, context: &FinancialContext, rng: &mut R) -> String {
    match detect_intent(message) {
        Intent::Spending => spending_reply(&context.totals),
        Intent::Savings => savings_reply(context),
        Intent::Goals => goals_reply(&context.goals),
        Intent::Budget => budget_reply(context.budget.as_ref()),
        Intent::Advice => TIPS.choose(rng).copied().unwrap_or(TIPS[0]).to_string(),
        Intent::Greeting => greeting_reply(),
        Intent::Fallback => fallback_reply(),
    }
}

/// The snapshot flattened into a prompt for the completion API.
pub fn build_prompt(message: &str, context: &FinancialContext) -> String {
    let totals = &context.totals;
    let mut prompt = format!("Pregunta del usuario: {}\n\n", message);

    prompt.push_str("Contexto financiero del usuario:\n");
    prompt.push_str(&format!("- Gastos este mes: ${}\n", format_clp(totals.expenses)));
    prompt.push_str(&format!("- Ingresos este mes: ${}\n", format_clp(totals.income)));
    prompt.push_str(&format!("- Balance: ${}\n", format_clp(totals.balance)));
    prompt.push_str(&format!("- Ahorro con cupones: ${}\n\n", format_clp(totals.savings)));

    if !context.goals.is_empty() {
        prompt.push_str("Metas activas:\n");
        for goal in &context.goals {
            prompt.push_str(&format!(
                "- {}: {}% completado (${}/${})\n",
                goal.name,
                goal.progress_label,
                format_clp(goal.current),
                format_clp(goal.target)
            ));
        }
        prompt.push('\n');
    }

    if let Some(budget) = &context.budget {
        prompt.push_str(&format!("Presupuesto mensual: {}% usado\n\n", budget.usage_label));
    }

    prompt.push_str("Responde de forma concisa, amigable y con emojis apropiados. Máximo 3 párrafos.");
    prompt
}

pub fn proactive_alerts(context: &FinancialContext) -> Vec<ProactiveAlert> {
    let mut alerts = Vec::new();

    if let Some(budget) = context.budget.as_ref().filter(|b| b.usage > 80.0) {
        alerts.push(ProactiveAlert {
            tipo: "presupuesto".into(),
            urgencia: if budget.usage > 90.0 { Urgency::Alta } else { Urgency::Media },
            mensaje: format!("Has usado el {}% de tu presupuesto mensual", budget.usage_label),
            accion: "Ver presupuesto".into(),
        });
    }

    for goal in context
        .goals
        .iter()
        .filter(|g| g.progress < 10.0 && g.days_since_creation > 30)
    {
        alerts.push(ProactiveAlert {
            tipo: "meta".into(),
            urgencia: Urgency::Baja,
            mensaje: format!("Tu meta \"{}\" lleva un mes sin avances", goal.name),
            accion: "Agregar fondos".into(),
        });
    }

    if context.totals.balance < 0.0 {
        alerts.push(ProactiveAlert {
            tipo: "balance".into(),
            urgencia: Urgency::Alta,
            mensaje: "Tus gastos superan tus ingresos este mes".into(),
            accion: "Ver análisis".into(),
        });
    }

    alerts
}

/// Gathers this month's totals, active goals, current budget and coupon count.
pub async fn load_context(db: &MongoDB, user: ObjectId) -> AppResult<FinancialContext> {
    let (month, year) = current_period();
    let transactions = transaction_service::month_transactions(db, user, month, year, None).await?;
    let stats = transaction_service::compute_statistics(&transactions);

    let income = stats.total_for(TransactionKind::Ingreso);
    let expenses = stats.total_for(TransactionKind::Gasto);
    let totals = MonthTotals {
        income,
        expenses,
        balance: income - expenses,
        savings: stats.ahorro_total,
    };

    let now = Utc::now();
    let mut goals: Vec<GoalSnapshot> = goal_service::active_goals(db, user, CONTEXT_GOALS)
        .await?
        .iter()
        .map(|g| GoalSnapshot::from_goal(g, now))
        .collect();
    goals.sort_by(|a, b| b.progress.total_cmp(&a.progress));

    let budget = budget_service::current(db, user).await?;
    let available_coupons = db.collection::<Document>(CODES).count_documents(doc! {}).await?;

    Ok(FinancialContext {
        totals,
        goals,
        budget: budget.as_ref().map(BudgetSnapshot::from),
        available_coupons,
    })
}

/// Answers with the completion provider when one is given, falling back to the rules.
pub async fn answer(
    provider: Option<&dyn CompletionProvider>,
    message: &str,
    context: &FinancialContext,
) -> String {
    if let Some(provider) = provider {
        match provider.complete(&build_prompt(message, context)).await {
            Ok(text) => return text,
            Err(e) => log::warn!("⚠️ Completion failed, using rule-based reply: {}", e),
        }
    }
    rule_reply(message, context, &mut rand::thread_rng())
}

pub async fn reply(db: &MongoDB, config: &AppConfig, user: ObjectId, message: &str) -> AppResult<ChatReply> {
    let context = load_context(db, user).await?;
    let provider = OpenAiClient::from_config(config);
    let respuesta = answer(provider.as_ref().map(|p| p as &dyn CompletionProvider), message, &context).await;

    log::debug!("💬 Chat reply for user {} ({:?})", user, detect_intent(message));
    Ok(ChatReply { success: true, respuesta, timestamp: Utc::now() })
}

pub async fn alerts(db: &MongoDB, user: ObjectId) -> AppResult<AlertsReply> {
    let context = load_context(db, user).await?;
    Ok(AlertsReply { success: true, alertas: proactive_alerts(&context) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::{rngs::StdRng, SeedableRng};

    struct FixedProvider(Option<String>);

    #[async_trait]
    impl CompletionProvider for FixedProvider {
        async fn complete(&self, prompt: &str) -> AppResult<String> {
            assert!(prompt.starts_with("Pregunta del usuario:"));
            self.0.clone().ok_or_else(|| AppError::Internal("down".into()))
        }
    }

    fn goal(name: &str, progress: f64, days: i64) -> GoalSnapshot {
        GoalSnapshot {
            name: name.into(),
            icon: "🎯".into(),
            progress,
            progress_label: format!("{:.2}", progress),
            current: progress * 1000.0,
            target: 100_000.0,
            days_since_creation: days,
        }
    }

    fn budget(usage: f64) -> BudgetSnapshot {
        BudgetSnapshot {
            usage,
            usage_label: format!("{:.2}", usage),
            total_budget: 100_000.0,
            total_spent: usage * 1000.0,
        }
    }

    fn context() -> FinancialContext {
        FinancialContext {
            totals: MonthTotals { income: 500_000.0, expenses: 320_000.0, balance: 180_000.0, savings: 5_000.0 },
            goals: vec![goal("Viaje", 45.0, 10)],
            budget: Some(budget(50.0)),
            available_coupons: 12,
        }
    }

    #[test]
    fn test_intents_in_order() {
        assert_eq!(detect_intent("¿Cuánto gasté este mes?"), Intent::Spending);
        assert_eq!(detect_intent("GASTOS"), Intent::Spending);
        // spending is checked before savings
        assert_eq!(detect_intent("cuanto llevo ahorrado"), Intent::Spending);
        assert_eq!(detect_intent("quiero ahorrar más"), Intent::Savings);
        assert_eq!(detect_intent("¿cómo van mis metas?"), Intent::Goals);
        assert_eq!(detect_intent("mi presupuesto"), Intent::Budget);
        assert_eq!(detect_intent("necesito ayuda"), Intent::Advice);
        assert_eq!(detect_intent("Hola Nubi"), Intent::Greeting);
        assert_eq!(detect_intent("¿qué opinas de bitcoin?"), Intent::Fallback);
    }

    #[test]
    fn test_spending_reply_uses_totals() {
        let mut rng = StdRng::seed_from_u64(7);
        let positive = rule_reply("cuánto gasté", &context(), &mut rng);
        assert!(positive.contains("$320.000"));
        assert!(positive.contains("balance positivo de $180.000"));

        let mut ctx = context();
        ctx.totals.balance = -20_000.0;
        let negative = rule_reply("mis gastos", &ctx, &mut rng);
        assert!(negative.contains("superan tus ingresos por $20.000"));
    }

    #[test]
    fn test_savings_reply_without_coupons() {
        let mut ctx = context();
        ctx.totals.savings = 0.0;
        let reply = rule_reply("ahorro", &ctx, &mut StdRng::seed_from_u64(1));
        assert!(reply.contains("Tengo 12 cupones disponibles"));
    }

    #[test]
    fn test_goals_reply() {
        let mut rng = StdRng::seed_from_u64(1);
        let reply = rule_reply("metas", &context(), &mut rng);
        assert!(reply.starts_with("Tienes 1 meta activa"));
        assert!(reply.contains("• 🎯 Viaje: 45.00% ($45.000/$100.000)"));
        assert!(reply.ends_with("¡Vas muy bien! 🚀"));

        let mut ctx = context();
        ctx.goals.clear();
        assert!(rule_reply("metas", &ctx, &mut rng).starts_with("No tienes metas"));
    }

    #[test]
    fn test_budget_reply_thresholds() {
        assert!(budget_reply(None).starts_with("No tienes un presupuesto"));
        assert!(budget_reply(Some(&budget(95.0))).contains("Te quedan $5.000"));
        assert!(budget_reply(Some(&budget(80.0))).contains("acercando al límite"));
        assert!(budget_reply(Some(&budget(50.0))).starts_with("¡Vas bien!"));
    }

    #[test]
    fn test_advice_is_one_of_the_tips() {
        let reply = rule_reply("dame un consejo", &context(), &mut StdRng::seed_from_u64(3));
        assert!(TIPS.contains(&reply.as_str()));
    }

    #[test]
    fn test_prompt_contains_snapshot() {
        let prompt = build_prompt("¿voy bien?", &context());
        assert!(prompt.contains("- Ingresos este mes: $500.000"));
        assert!(prompt.contains("- Viaje: 45.00% completado"));
        assert!(prompt.contains("Presupuesto mensual: 50.00% usado"));
        assert!(prompt.ends_with("Máximo 3 párrafos."));
    }

    #[test]
    fn test_proactive_alerts() {
        assert!(proactive_alerts(&context()).is_empty());

        let ctx = FinancialContext {
            totals: MonthTotals { balance: -1.0, ..Default::default() },
            goals: vec![goal("Auto", 5.0, 45), goal("Casa", 5.0, 3)],
            budget: Some(budget(85.0)),
            available_coupons: 0,
        };
        let alerts = proactive_alerts(&ctx);
        assert_eq!(alerts.len(), 3);
        assert_eq!(alerts[0].tipo, "presupuesto");
        assert_eq!(alerts[0].urgencia, Urgency::Media);
        assert_eq!(alerts[1].mensaje, "Tu meta \"Auto\" lleva un mes sin avances");
        assert_eq!(alerts[2].urgencia, Urgency::Alta);

        let high = FinancialContext { budget: Some(budget(91.0)), ..Default::default() };
        assert_eq!(proactive_alerts(&high)[0].urgencia, Urgency::Alta);
    }

    #[test]
    fn test_chat_request_validation() {
        assert!(ChatRequest { mensaje: None }.message().is_err());
        assert!(ChatRequest { mensaje: Some("   ".into()) }.message().is_err());
        assert_eq!(ChatRequest { mensaje: Some(" hola ".into()) }.message().unwrap(), "hola");
    }

    #[actix_web::test]
    async fn test_answer_prefers_provider_and_falls_back() {
        let ok = FixedProvider(Some("Respuesta IA".into()));
        assert_eq!(answer(Some(&ok), "hola", &context()).await, "Respuesta IA");

        let failing = FixedProvider(None);
        let reply = answer(Some(&failing), "hola", &context()).await;
        assert!(reply.starts_with("¡Hola!"));

        assert!(answer(None, "xyz", &context()).await.starts_with("Interesante pregunta"));
    }
}
