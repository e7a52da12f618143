pub mod core;
pub mod catalog;
pub mod index;
pub mod query;
pub mod storage;
pub mod search;
pub mod engine;

/*
┌──────────────────────────────────────────────────────────────────────────┐
│                      FIELDSEARCH STRUCT ARCHITECTURE                     │
└──────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── FACADE ──────────────────────────────────┐
│                                                                          │
│  ┌────────────────────────────────────────────────────────────────────┐  │
│  │                     struct FieldSearchEngine                       │  │
│  │  config: Config                   // validated at open()           │  │
│  │  store: Arc<dyn ObjectStore>      // primary-store resolver        │  │
│  │  index: IndexEngine               // live map + committed snapshot │  │
│  │  writer: Mutex<WriteState>        // WAL + pending mutation count  │  │
│  │  cache: ResultCache               // token -> paged session        │  │
│  │  stats: Arc<EngineStats>          // atomic counters               │  │
│  └────────────────────────────────────────────────────────────────────┘  │
│                                                                          │
│  update/delete ──> build_document ──> IndexEngine.upsert/delete          │
│                        │                    │                            │
│                        └──> WriteLog.append ┴──> commit every N          │
│                                                                          │
│  find_objects ──> QueryBuilder.compile ──> Snapshot.search ──> PidList   │
│                                                    │                     │
│                              ResultCache <── first page + token          │
│  resume_find_objects(token) ──> next page, new token or termination      │
└──────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── COMPONENTS ───────────────────────────────┐
│                                                                          │
│  ┌──────────────────┐  ┌───────────────────┐  ┌───────────────────────┐  │
│  │ catalog          │  │ struct WriteLog   │  │ struct PidList        │  │
│  │ • FieldSpec      │  │ • log file        │  │ • mem: Vec<String>    │  │
│  │ • CATALOG table  │  │ • committing file │  │ • spill: SpillFile    │  │
│  │ • exact markers  │  │ • crc32 frames    │  │ • threshold           │  │
│  └──────────────────┘  └───────────────────┘  └───────────────────────┘  │
│                                                                          │
│  ┌──────────────────┐  ┌───────────────────┐  ┌───────────────────────┐  │
│  │ IndexEngine      │  │ CompiledQuery     │  │ ResultCache           │  │
│  │ • live docs      │  │ • MatchAll        │  │ • RwLock<HashMap>     │  │
│  │ • Arc<Snapshot>  │  │ • And(clauses)    │  │ • sweeper thread      │  │
│  │ • bincode file   │  │ • AnyField(term)  │  │ • lifetime eviction   │  │
│  └──────────────────┘  └───────────────────┘  └───────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────┘
*/
