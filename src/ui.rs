use crate::aggregation::{RateTier, HIGH_RATE_THRESHOLD, MEDIUM_RATE_THRESHOLD};
use crate::models::{Category, FALLBACK_LINE_COLOR};
use serde_json::json;

pub fn render_index(branches: &[String], reps: &[String]) -> String {
    INDEX_HTML
        .replace("{{BRANCH_OPTIONS}}", &options_html(branches))
        .replace("{{REP_OPTIONS}}", &options_html(reps))
        .replace("{{COUNT_INPUTS}}", &count_inputs_html())
        .replace("{{SERIES}}", &series_json())
        .replace("{{FALLBACK_COLOR}}", FALLBACK_LINE_COLOR)
        .replace("{{TIER_CLASSES}}", &tier_classes_json())
        .replace("{{HIGH}}", &HIGH_RATE_THRESHOLD.to_string())
        .replace("{{MEDIUM}}", &MEDIUM_RATE_THRESHOLD.to_string())
}

fn options_html(values: &[String]) -> String {
    values
        .iter()
        .map(|value| {
            let value = escape_html(value);
            format!(r#"<option value="{value}">{value}</option>"#)
        })
        .collect::<Vec<_>>()
        .join("\n            ")
}

fn count_inputs_html() -> String {
    Category::ALL
        .iter()
        .map(|category| {
            let key = category.key();
            let label = key.replace('_', " ");
            format!(
                r#"<div class="pair">
            <input type="number" min="0" name="{key}_quotes" placeholder="{label} quotes" />
            <input type="number" min="0" name="{key}_sales" placeholder="{label} sales" />
          </div>"#
            )
        })
        .collect::<Vec<_>>()
        .join("\n          ")
}

fn series_json() -> String {
    let series: Vec<_> = Category::ALL
        .iter()
        .map(|category| {
            json!({
                "key": format!("{}_sales", category.key()),
                "label": category.sales_label(),
                "color": category.sales_color(),
            })
        })
        .collect();
    serde_json::Value::Array(series).to_string()
}

fn tier_classes_json() -> String {
    json!({
        "high": RateTier::High.css_class(),
        "medium": RateTier::Medium.css_class(),
        "low": RateTier::Low.css_class(),
    })
    .to_string()
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Weekly KPI Reporting</title>
  <style>
    :root {
      --bg: #f4f1ea;
      --ink: #2b2a28;
      --muted: #6b645d;
      --accent: #2f4858;
      --card: #ffffff;
      --line: rgba(47, 72, 88, 0.12);
      --high: #16a34a;
      --medium: #ca8a04;
      --low: #dc2626;
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(900px, 100%);
      margin: 0 auto;
      display: grid;
      gap: 24px;
    }

    h1 {
      margin: 0;
      font-family: "Georgia", serif;
      font-size: clamp(1.8rem, 4vw, 2.4rem);
    }

    h2 {
      margin: 0 0 12px;
      font-size: 1.25rem;
    }

    .card {
      background: var(--card);
      border-radius: 20px;
      border: 1px solid var(--line);
      box-shadow: 0 16px 40px rgba(47, 72, 88, 0.10);
      padding: 24px;
      display: grid;
      gap: 12px;
    }

    .pair,
    .filters {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
      gap: 10px;
    }

    input,
    select {
      width: 100%;
      border-radius: 10px;
      border: 1px solid rgba(47, 72, 88, 0.25);
      padding: 10px 12px;
      font-size: 0.95rem;
      font-family: inherit;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 12px 20px;
      font-size: 1rem;
      font-weight: 600;
      cursor: pointer;
      background: var(--accent);
      color: white;
      justify-self: start;
    }

    .totals {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
      gap: 12px;
    }

    .stat {
      border-radius: 14px;
      border: 1px solid var(--line);
      padding: 14px;
      display: grid;
      gap: 6px;
    }

    .stat .label {
      font-size: 0.8rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #8b857d;
    }

    .stat .value {
      font-size: 1.6rem;
      font-weight: 600;
    }

    .group-row {
      margin: 0 0 6px;
    }

    .tier-high {
      color: var(--high);
      font-weight: 600;
    }

    .tier-medium {
      color: var(--medium);
      font-weight: 500;
    }

    .tier-low {
      color: var(--low);
      font-weight: 500;
    }

    #chart {
      width: 100%;
      height: 300px;
      display: block;
    }

    .chart-grid {
      stroke: var(--line);
    }

    .chart-label {
      fill: #7a746d;
      font-size: 11px;
    }

    .chart-line {
      fill: none;
      stroke-width: 2.5;
    }

    .legend {
      display: flex;
      flex-wrap: wrap;
      gap: 14px;
      font-size: 0.9rem;
    }

    .legend span::before {
      content: "";
      display: inline-block;
      width: 12px;
      height: 12px;
      border-radius: 3px;
      margin-right: 6px;
      background: var(--swatch);
    }

    .status {
      font-size: 0.95rem;
      color: var(--muted);
      min-height: 1.2em;
    }

    .status[data-type="error"] {
      color: var(--low);
    }

    .status[data-type="ok"] {
      color: var(--high);
    }

    .hint {
      margin: 0;
      color: var(--muted);
      font-size: 0.9rem;
    }
  </style>
</head>
<body>
  <main class="app">
    <h1>Weekly KPI Reporting</h1>

    <section class="card">
      <h2>Submit Weekly Report</h2>
      <form id="report-form" method="post" action="/reports" class="card-body">
        <div class="filters">
          <input type="date" name="date" required />
          <select name="branch">
            {{BRANCH_OPTIONS}}
          </select>
          <select name="rep">
            {{REP_OPTIONS}}
          </select>
        </div>
        <div class="counts">
          {{COUNT_INPUTS}}
        </div>
        <button type="submit">Submit</button>
      </form>
      <div class="status" id="status"></div>
    </section>

    <section class="card">
      <h2>Filter</h2>
      <div class="filters">
        <select id="filter-branch">
          <option value="">All Branches</option>
          {{BRANCH_OPTIONS}}
        </select>
        <select id="filter-rep">
          <option value="">All Reps</option>
          {{REP_OPTIONS}}
        </select>
        <input type="date" id="filter-start" aria-label="Start Date" />
        <input type="date" id="filter-end" aria-label="End Date" />
      </div>
    </section>

    <section class="card">
      <h2>Totals</h2>
      <div class="totals">
        <div class="stat">
          <span class="label">Total Quotes</span>
          <span class="value" id="total-quotes">0</span>
        </div>
        <div class="stat">
          <span class="label">Total Sales</span>
          <span class="value" id="total-sales">0</span>
        </div>
        <div class="stat">
          <span class="label">Conversion Rate</span>
          <span class="value" id="total-rate">0.0%</span>
        </div>
      </div>
    </section>

    <section class="card">
      <h2>Totals by Branch</h2>
      <div id="by-branch"></div>
    </section>

    <section class="card">
      <h2>Totals by Rep</h2>
      <div id="by-rep"></div>
      <p class="hint">Branch and rep breakdowns cover every stored report; only the Totals card and the chart follow the filter. Rates of {{HIGH}}% or more show green, {{MEDIUM}}% or more amber.</p>
    </section>

    <section class="card">
      <h2>Weekly Summary</h2>
      <svg id="chart" viewBox="0 0 600 300" aria-label="Sales per week" role="img"></svg>
      <div class="legend" id="legend"></div>
    </section>
  </main>

  <script>
    const SERIES = {{SERIES}};
    const FALLBACK_COLOR = '{{FALLBACK_COLOR}}';
    const TIER_CLASSES = {{TIER_CLASSES}};

    const form = document.getElementById('report-form');
    const statusEl = document.getElementById('status');
    const chartEl = document.getElementById('chart');
    const legendEl = document.getElementById('legend');
    const filterEls = {
      branch: document.getElementById('filter-branch'),
      rep: document.getElementById('filter-rep'),
      start_date: document.getElementById('filter-start'),
      end_date: document.getElementById('filter-end')
    };

    let latestRequest = 0;

    const setStatus = (message, type) => {
      statusEl.textContent = message;
      statusEl.dataset.type = type || '';
    };

    const tierClass = (tier) => TIER_CLASSES[tier] || '';
    const formatRate = (rate) => `${Number(rate).toFixed(1)}%`;
    const colorFor = (key) => (SERIES.find((series) => series.key === key) || {}).color || FALLBACK_COLOR;

    const renderTotals = (totals) => {
      document.getElementById('total-quotes').textContent = totals.quotes;
      document.getElementById('total-sales').textContent = totals.sales;
      const rateEl = document.getElementById('total-rate');
      rateEl.textContent = formatRate(totals.conversion_rate);
      rateEl.className = `value ${tierClass(totals.tier)}`;
    };

    const renderGroups = (target, groups) => {
      target.innerHTML = '';
      if (!groups.length) {
        target.textContent = 'No reports yet.';
        return;
      }
      groups.forEach((group) => {
        const row = document.createElement('p');
        row.className = 'group-row';
        const key = document.createElement('strong');
        key.textContent = `${group.key}:`;
        const rate = document.createElement('span');
        rate.className = tierClass(group.tier);
        rate.textContent = `${formatRate(group.conversion_rate)} Conversion`;
        row.append(key, ` ${group.quotes} Quotes, ${group.sales} Sales, `, rate);
        target.appendChild(row);
      });
    };

    const renderLegend = () => {
      legendEl.innerHTML = '';
      SERIES.forEach((series) => {
        const item = document.createElement('span');
        item.style.setProperty('--swatch', colorFor(series.key));
        item.textContent = series.label;
        legendEl.appendChild(item);
      });
    };

    const renderChart = (points) => {
      if (!points.length) {
        chartEl.innerHTML = '<text class="chart-label" x="50%" y="50%" text-anchor="middle">No data yet</text>';
        return;
      }

      const width = 600;
      const height = 300;
      const paddingX = 44;
      const paddingY = 34;
      const top = 20;

      const values = points.flatMap((point) => SERIES.map((series) => point[series.key]));
      const max = Math.max(1, ...values);
      const xStep = points.length > 1 ? (width - paddingX * 2) / (points.length - 1) : 0;
      const scaleY = (height - top - paddingY) / max;
      const x = (index) => paddingX + index * xStep;
      const y = (value) => height - paddingY - value * scaleY;

      const ticks = 4;
      let grid = '';
      for (let i = 0; i <= ticks; i += 1) {
        const value = (max * i) / ticks;
        const yPos = y(value);
        grid += `<line class="chart-grid" x1="${paddingX}" y1="${yPos}" x2="${width - paddingX}" y2="${yPos}" />`;
        grid += `<text class="chart-label" x="${paddingX - 10}" y="${yPos + 4}" text-anchor="end">${Math.round(value * 10) / 10}</text>`;
      }

      const lines = SERIES.map((series) => {
        const path = points
          .map((point, index) => `${index === 0 ? 'M' : 'L'} ${x(index).toFixed(2)} ${y(point[series.key]).toFixed(2)}`)
          .join(' ');
        return `<path class="chart-line" stroke="${colorFor(series.key)}" d="${path}"><title>${series.label}</title></path>`;
      }).join('');

      const labelEvery = Math.max(1, Math.ceil(points.length / 8));
      const xLabels = points
        .map((point, index) => {
          if (index % labelEvery !== 0) {
            return '';
          }
          return `<text class="chart-label" x="${x(index)}" y="${height - paddingY + 18}" text-anchor="middle">${point.date}</text>`;
        })
        .join('');

      chartEl.innerHTML = `${grid}${lines}${xLabels}`;
    };

    const filterQuery = () => {
      const params = new URLSearchParams();
      Object.entries(filterEls).forEach(([name, el]) => {
        if (el.value) {
          params.set(name, el.value);
        }
      });
      return params.toString();
    };

    // Responses can arrive out of order; only the newest request may repaint.
    const refresh = async () => {
      const requestId = ++latestRequest;
      const isStale = () => requestId !== latestRequest;
      let data;
      try {
        const res = await fetch(`/api/dashboard?${filterQuery()}`);
        if (isStale()) {
          return;
        }
        if (!res.ok) {
          throw new Error((await res.text()) || 'Unable to load dashboard');
        }
        data = await res.json();
      } catch (err) {
        if (isStale()) {
          return;
        }
        throw err;
      }
      if (isStale()) {
        return;
      }
      renderTotals(data.totals);
      renderGroups(document.getElementById('by-branch'), data.by_branch);
      renderGroups(document.getElementById('by-rep'), data.by_rep);
      renderChart(data.series);
    };

    const submitReport = async () => {
      setStatus('Saving...', 'info');
      const payload = Object.fromEntries(new FormData(form).entries());
      const res = await fetch('/api/reports', {
        method: 'POST',
        headers: { 'content-type': 'application/json' },
        body: JSON.stringify(payload)
      });

      if (!res.ok) {
        throw new Error((await res.text()) || 'Request failed');
      }

      setStatus('Saved', 'ok');
      setTimeout(() => setStatus('', ''), 1200);
      await refresh();
    };

    form.addEventListener('submit', (event) => {
      event.preventDefault();
      submitReport().catch((err) => setStatus(err.message, 'error'));
    });

    Object.values(filterEls).forEach((el) => {
      el.addEventListener('change', () => refresh().catch((err) => setStatus(err.message, 'error')));
    });

    renderLegend();
    refresh().catch((err) => setStatus(err.message, 'error'));
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_lists_configured_options_escaped() {
        let html = render_index(&["ACS".to_string(), "R&D".to_string()], &["Kari".to_string()]);
        assert!(html.contains(r#"<option value="ACS">ACS</option>"#));
        assert!(html.contains(r#"<option value="R&amp;D">R&amp;D</option>"#));
        assert!(html.contains(r#"<option value="Kari">Kari</option>"#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn page_has_an_input_pair_per_category() {
        let html = render_index(&[], &[]);
        for category in Category::ALL {
            assert!(html.contains(&format!(r#"name="{}_quotes""#, category.key())));
            assert!(html.contains(&format!(r#"name="{}_sales""#, category.key())));
            assert!(html.contains(category.sales_color()));
        }
        assert!(html.contains("one time quotes"));
        assert!(html.contains(r#""medium":"tier-medium""#));
    }

    #[test]
    fn refresh_checks_staleness_before_reporting_errors() {
        let html = render_index(&[], &[]);
        let guard = html.find("if (isStale())").expect("missing stale guard");
        let throw = html
            .find("throw new Error((await res.text()) || 'Unable to load dashboard')")
            .expect("missing error path");
        assert!(guard < throw);
        assert!(html.contains("} catch (err) {\n        if (isStale())"));
    }
}
