//! Built-in task descriptions selectable with `--preset`.

pub struct Preset {
    pub name: &'static str,
    pub task: &'static str,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "data_analyzer",
        task: "\
Write a Python program that:
1. Defines a class `DataAnalyzer` that reads a CSV file and performs basic analysis.
2. Implements these methods:
   - load_data(filepath): read the CSV file
   - get_summary_statistics(): return mean, median, standard deviation and similar
   - find_correlations(): compute correlations between columns
   - plot_distributions(columns): draw histograms of the selected columns
   - export_results(output_path): export the analysis results to a JSON file
3. Adds appropriate error handling and logging.
4. Provides a simple command line interface.
5. Includes docstrings and example usage.",
    },
    Preset {
        name: "web_scraper",
        task: "\
Write a Python program that:
1. Defines a web scraper class that crawls the content of a given site.
2. Supports:
   - HTTP and HTTPS
   - basic anti-bot countermeasures (User-Agent rotation, request delays)
   - extraction of structured data (title, body text, image URLs)
   - CSS selectors and XPath for extraction
   - saving scraped data as JSON or CSV
3. Implements error handling and retries.
4. Uses asynchronous I/O for throughput.
5. Includes complete documentation and usage examples.",
    },
    Preset {
        name: "api_server",
        task: "\
Write a Python program that:
1. Uses FastAPI to build a RESTful API server.
2. Implements these endpoints:
   - GET /items: list all items
   - GET /items/{item_id}: fetch one item
   - POST /items: create an item
   - PUT /items/{item_id}: update an item
   - DELETE /items/{item_id}: delete an item
3. Validates data with Pydantic models.
4. Implements basic authentication (for example JWT).
5. Adds request logging and error handling.
6. Ships Swagger/OpenAPI documentation.
7. Provides unit tests.",
    },
];

pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.name == name)
}

pub fn names() -> Vec<&'static str> {
    PRESETS.iter().map(|preset| preset.name).collect()
}
