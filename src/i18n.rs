use clap::ValueEnum;
use serde::Serialize;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Ua,
    Fr,
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::En => "en",
            Self::Ua => "ua",
            Self::Fr => "fr",
        })
    }
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ua" | "uk" => Ok(Self::Ua),
            "fr" => Ok(Self::Fr),
            other => Err(format!("unsupported language '{other}'")),
        }
    }
}

type Table = &'static [(&'static str, &'static str)];

const EN: Table = &[
    ("app.title", "BTC Cycle Timer"),
    ("timer.event", "Event"),
    ("timer.days_left", "Days left"),
    ("timer.date", "Date"),
    ("timer.halving", "Next halving"),
    ("timer.peak", "Cycle peak"),
    ("timer.bottom", "Cycle bottom"),
    ("price.current", "Current BTC price"),
    ("price.live", "live"),
    ("price.archived", "last archived close"),
    ("price.unavailable", "Price unavailable"),
    ("progress.title", "Cycle progress"),
    ("phase.title", "Current phase"),
    ("phase.accumulation", "Accumulation"),
    ("phase.parabolic", "Parabolic growth"),
    ("phase.distribution", "Distribution"),
    ("phase.capitulation", "Capitulation"),
    ("phase.unknown", "Unknown"),
    ("event.halving_prev", "Halving"),
    ("event.halving", "Halving"),
    ("event.peak", "Peak"),
    ("event.bottom", "Bottom"),
    ("event.bottom_forecast", "Bottom (forecast)"),
    ("telegram.stats", "Statistics"),
    ("stats.current_price", "Current price"),
    ("stats.days_from_bottom_anchor", "Days since bottom"),
    ("stats.percent_progress", "Cycle progress"),
    ("stats.roi_from_bottom", "ROI from forecast bottom"),
    ("stats.roi_to_peak", "ROI to forecast peak"),
    ("stats.roi_bottom_to_peak", "ROI bottom to peak"),
    ("stats.forecast_peak_price", "Forecast peak price"),
    ("stats.forecast_bottom_price", "Forecast bottom price"),
    ("unit.days", "days"),
    ("chart.title", "Bitcoin cycle phases"),
    ("chart.x_axis", "Date"),
    ("chart.y_axis", "BTC price (USD)"),
    ("line.btc_price", "BTC price"),
    ("line.prev_bottom", "Previous bottom"),
    ("line.pattern_projection", "Pattern projection"),
    ("line.forecasted_peak_level", "Forecast peak zone"),
    ("line.forecasted_bottom_level", "Forecast bottom zone"),
    ("projection.none", "No pattern projection available"),
    ("cycles.structure", "Bitcoin cycle structure (by halvings)"),
    ("cycles.analysis", "Historical cycle analysis"),
    ("cycles.future", "Future cycle forecast"),
    ("cycles.averages", "Averages"),
    ("config.issues", "Configuration issues"),
    ("export.written", "Cycle data exported"),
    ("rec.title", "Recommendation"),
    ("rec.strategy", "Strategy"),
    ("rec.risk_level", "Risk level"),
    ("rec.timeframe", "Timeframe"),
    ("rec.indicators", "Key indicators"),
    ("rec.accumulation.strategy", "Accumulate BTC gradually"),
    ("rec.accumulation.risk", "Low"),
    ("rec.accumulation.timeframe", "Long-term (2-4 years)"),
    ("rec.accumulation.ind1", "Price consolidation"),
    ("rec.accumulation.ind2", "Low volume"),
    ("rec.accumulation.ind3", "Fear sentiment"),
    ("rec.parabolic.strategy", "Hold and monitor for distribution signals"),
    ("rec.parabolic.risk", "Medium-High"),
    ("rec.parabolic.timeframe", "Medium-term (6-18 months)"),
    ("rec.parabolic.ind1", "Rapid price increase"),
    ("rec.parabolic.ind2", "High volume"),
    ("rec.parabolic.ind3", "FOMO sentiment"),
    ("rec.distribution.strategy", "Consider taking profits gradually"),
    ("rec.distribution.risk", "High"),
    ("rec.distribution.timeframe", "Short-term (3-6 months)"),
    ("rec.distribution.ind1", "Price volatility"),
    ("rec.distribution.ind2", "Divergence patterns"),
    ("rec.distribution.ind3", "Smart money selling"),
    ("rec.capitulation.strategy", "Prepare for accumulation phase"),
    ("rec.capitulation.risk", "Very High"),
    ("rec.capitulation.timeframe", "Short-term (1-3 months)"),
    ("rec.capitulation.ind1", "Sharp price decline"),
    ("rec.capitulation.ind2", "Panic selling"),
    ("rec.capitulation.ind3", "Extreme fear"),
    ("rec.unknown.strategy", "Monitor market conditions"),
    ("rec.unknown.risk", "Unknown"),
    ("rec.unknown.timeframe", "Until the phase is clear"),
];

const UA: Table = &[
    ("app.title", "Таймер циклу BTC"),
    ("timer.event", "Подія"),
    ("timer.days_left", "Днів до"),
    ("timer.date", "Дата"),
    ("timer.halving", "Наступний халвінг"),
    ("timer.peak", "Пік циклу"),
    ("timer.bottom", "Дно циклу"),
    ("price.current", "Поточна ціна BTC"),
    ("price.live", "онлайн"),
    ("price.archived", "останнє закриття з архіву"),
    ("price.unavailable", "Ціна недоступна"),
    ("progress.title", "Прогрес циклу"),
    ("phase.title", "Поточна фаза"),
    ("phase.accumulation", "Накопичення"),
    ("phase.parabolic", "Параболічне зростання"),
    ("phase.distribution", "Розподіл"),
    ("phase.capitulation", "Капітуляція"),
    ("phase.unknown", "Невідомо"),
    ("event.halving_prev", "Халвінг"),
    ("event.halving", "Халвінг"),
    ("event.peak", "Пік"),
    ("event.bottom", "Дно"),
    ("event.bottom_forecast", "Дно (прогноз)"),
    ("telegram.stats", "Статистика"),
    ("stats.current_price", "Поточна ціна"),
    ("stats.days_from_bottom_anchor", "Днів від дна"),
    ("stats.percent_progress", "Прогрес циклу"),
    ("stats.roi_from_bottom", "ROI від прогнозного дна"),
    ("stats.roi_to_peak", "ROI до прогнозного піку"),
    ("stats.roi_bottom_to_peak", "ROI від дна до піку"),
    ("stats.forecast_peak_price", "Прогнозна ціна піку"),
    ("stats.forecast_bottom_price", "Прогнозна ціна дна"),
    ("unit.days", "днів"),
    ("chart.title", "Фази циклу Bitcoin"),
    ("chart.x_axis", "Дата"),
    ("chart.y_axis", "Ціна BTC (USD)"),
    ("line.btc_price", "Ціна BTC"),
    ("line.prev_bottom", "Попереднє дно"),
    ("line.pattern_projection", "Проєкція патерну"),
    ("line.forecasted_peak_level", "Зона прогнозного піку"),
    ("line.forecasted_bottom_level", "Зона прогнозного дна"),
    ("projection.none", "Проєкція патерну недоступна"),
    ("cycles.structure", "Структура циклів Bitcoin (за халвінгами)"),
    ("cycles.analysis", "Аналіз історичних циклів"),
    ("cycles.future", "Прогноз майбутніх циклів"),
    ("cycles.averages", "Середні значення"),
    ("config.issues", "Проблеми конфігурації"),
    ("export.written", "Дані циклу експортовано"),
    ("rec.title", "Рекомендація"),
    ("rec.strategy", "Стратегія"),
    ("rec.risk_level", "Рівень ризику"),
    ("rec.timeframe", "Часові рамки"),
    ("rec.indicators", "Ключові індикатори"),
    ("rec.accumulation.strategy", "Поступово накопичувати BTC"),
    ("rec.accumulation.risk", "Низький"),
    ("rec.accumulation.timeframe", "Довгостроково (2-4 роки)"),
    ("rec.accumulation.ind1", "Консолідація ціни"),
    ("rec.accumulation.ind2", "Низькі обсяги"),
    ("rec.accumulation.ind3", "Страх на ринку"),
    ("rec.parabolic.strategy", "Тримати та стежити за сигналами розподілу"),
    ("rec.parabolic.risk", "Середньо-високий"),
    ("rec.parabolic.timeframe", "Середньостроково (6-18 місяців)"),
    ("rec.parabolic.ind1", "Швидке зростання ціни"),
    ("rec.parabolic.ind2", "Високі обсяги"),
    ("rec.parabolic.ind3", "FOMO"),
    ("rec.distribution.strategy", "Поступово фіксувати прибуток"),
    ("rec.distribution.risk", "Високий"),
    ("rec.distribution.timeframe", "Короткостроково (3-6 місяців)"),
    ("rec.distribution.ind1", "Волатильність ціни"),
    ("rec.distribution.ind2", "Дивергенції"),
    ("rec.distribution.ind3", "Продажі великих гравців"),
    ("rec.capitulation.strategy", "Готуватися до фази накопичення"),
    ("rec.capitulation.risk", "Дуже високий"),
    ("rec.capitulation.timeframe", "Короткостроково (1-3 місяці)"),
    ("rec.capitulation.ind1", "Різке падіння ціни"),
    ("rec.capitulation.ind2", "Панічні продажі"),
    ("rec.capitulation.ind3", "Екстремальний страх"),
    ("rec.unknown.strategy", "Стежити за ринком"),
    ("rec.unknown.risk", "Невідомо"),
    ("rec.unknown.timeframe", "Доки фаза не проясниться"),
];

const FR: Table = &[
    ("app.title", "Minuteur du cycle BTC"),
    ("timer.event", "Événement"),
    ("timer.days_left", "Jours restants"),
    ("timer.date", "Date"),
    ("timer.halving", "Prochain halving"),
    ("timer.peak", "Sommet du cycle"),
    ("timer.bottom", "Creux du cycle"),
    ("price.current", "Prix actuel du BTC"),
    ("price.live", "en direct"),
    ("price.archived", "dernière clôture archivée"),
    ("price.unavailable", "Prix indisponible"),
    ("progress.title", "Progression du cycle"),
    ("phase.title", "Phase actuelle"),
    ("phase.accumulation", "Accumulation"),
    ("phase.parabolic", "Croissance parabolique"),
    ("phase.distribution", "Distribution"),
    ("phase.capitulation", "Capitulation"),
    ("phase.unknown", "Inconnue"),
    ("event.halving_prev", "Halving"),
    ("event.halving", "Halving"),
    ("event.peak", "Sommet"),
    ("event.bottom", "Creux"),
    ("event.bottom_forecast", "Creux (prévision)"),
    ("telegram.stats", "Statistiques"),
    ("stats.current_price", "Prix actuel"),
    ("stats.days_from_bottom_anchor", "Jours depuis le creux"),
    ("stats.percent_progress", "Progression du cycle"),
    ("stats.roi_from_bottom", "ROI depuis le creux prévu"),
    ("stats.roi_to_peak", "ROI jusqu'au sommet prévu"),
    ("stats.roi_bottom_to_peak", "ROI du creux au sommet"),
    ("stats.forecast_peak_price", "Prix prévu au sommet"),
    ("stats.forecast_bottom_price", "Prix prévu au creux"),
    ("unit.days", "jours"),
    ("chart.title", "Phases du cycle Bitcoin"),
    ("chart.x_axis", "Date"),
    ("chart.y_axis", "Prix du BTC (USD)"),
    ("line.btc_price", "Prix du BTC"),
    ("line.prev_bottom", "Creux précédent"),
    ("line.pattern_projection", "Projection du motif"),
    ("line.forecasted_peak_level", "Zone de sommet prévue"),
    ("line.forecasted_bottom_level", "Zone de creux prévue"),
    ("projection.none", "Aucune projection disponible"),
    ("cycles.structure", "Structure des cycles Bitcoin (par halvings)"),
    ("cycles.analysis", "Analyse des cycles historiques"),
    ("cycles.future", "Prévision des cycles futurs"),
    ("cycles.averages", "Moyennes"),
    ("config.issues", "Problèmes de configuration"),
    ("export.written", "Données du cycle exportées"),
    ("rec.title", "Recommandation"),
    ("rec.strategy", "Stratégie"),
    ("rec.risk_level", "Niveau de risque"),
    ("rec.timeframe", "Horizon"),
    ("rec.indicators", "Indicateurs clés"),
    ("rec.accumulation.strategy", "Accumuler du BTC progressivement"),
    ("rec.accumulation.risk", "Faible"),
    ("rec.accumulation.timeframe", "Long terme (2-4 ans)"),
    ("rec.accumulation.ind1", "Consolidation du prix"),
    ("rec.accumulation.ind2", "Faible volume"),
    ("rec.accumulation.ind3", "Sentiment de peur"),
    ("rec.parabolic.strategy", "Conserver et surveiller les signaux de distribution"),
    ("rec.parabolic.risk", "Moyen-élevé"),
    ("rec.parabolic.timeframe", "Moyen terme (6-18 mois)"),
    ("rec.parabolic.ind1", "Hausse rapide du prix"),
    ("rec.parabolic.ind2", "Volume élevé"),
    ("rec.parabolic.ind3", "Sentiment FOMO"),
    ("rec.distribution.strategy", "Envisager des prises de bénéfices progressives"),
    ("rec.distribution.risk", "Élevé"),
    ("rec.distribution.timeframe", "Court terme (3-6 mois)"),
    ("rec.distribution.ind1", "Volatilité du prix"),
    ("rec.distribution.ind2", "Divergences"),
    ("rec.distribution.ind3", "Ventes des gros acteurs"),
    ("rec.capitulation.strategy", "Préparer la phase d'accumulation"),
    ("rec.capitulation.risk", "Très élevé"),
    ("rec.capitulation.timeframe", "Court terme (1-3 mois)"),
    ("rec.capitulation.ind1", "Chute brutale du prix"),
    ("rec.capitulation.ind2", "Ventes paniques"),
    ("rec.capitulation.ind3", "Peur extrême"),
    ("rec.unknown.strategy", "Surveiller le marché"),
    ("rec.unknown.risk", "Inconnu"),
    ("rec.unknown.timeframe", "Jusqu'à ce que la phase soit claire"),
];

fn table(lang: Lang) -> Table {
    match lang {
        Lang::En => EN,
        Lang::Ua => UA,
        Lang::Fr => FR,
    }
}

fn lookup(t: Table, key: &str) -> Option<&'static str> {
    t.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

/// Translated label; falls back to English, then to the key itself.
pub fn localize(key: &str, lang: Lang) -> String {
    lookup(table(lang), key)
        .or_else(|| lookup(EN, key))
        .map(str::to_string)
        .unwrap_or_else(|| key.to_string())
}
