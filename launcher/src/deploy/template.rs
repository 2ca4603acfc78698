//! GitHub Actions workflow pushed to every deployment branch

const WORKFLOW_TEMPLATE: &str = r#"name: Xylo Bot (__BRANCH__)

on:
  workflow_dispatch:

permissions:
  contents: read
  actions: write

concurrency:
  group: 'xylo-__BRANCH__'
  cancel-in-progress: false

jobs:
  run-bot:
    runs-on: ubuntu-latest
    timeout-minutes: 350
    steps:
      - name: Checkout
        uses: actions/checkout@v4
        with:
          ref: '__BRANCH__'

      - name: Set up Node.js
        uses: actions/setup-node@v4
        with:
          node-version: 20

      - name: Install dependencies
        run: npm install --omit=dev

      - name: Start bot
        run: timeout 20700 npm start || true

      - name: Schedule next run
        if: ${{ !cancelled() }}
        env:
          GH_TOKEN: ${{ secrets.GITHUB_TOKEN }}
        run: gh workflow run '__WORKFLOW_FILE__' --ref '__BRANCH__' --repo "${{ github.repository }}"
"#;

/// Path of the workflow file inside the repository
pub fn workflow_path(workflow_file: &str) -> String {
    format!(".github/workflows/{}", workflow_file)
}

/// Render the workflow for a deployment branch
///
/// The job runs the bot for just under six hours, then dispatches itself again
/// on the same branch so the process stays up.
pub fn render_workflow(branch: &str, workflow_file: &str) -> String {
    WORKFLOW_TEMPLATE
        .replace("__BRANCH__", branch)
        .replace("__WORKFLOW_FILE__", workflow_file)
}
